// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

use super::park::{park, Interest};
use crate::Result;
use abtag_core::status::ERR_ABORT;
use abtag_core::{RawTag, Status};
use tokio::sync::oneshot;

pub(crate) struct Operation<'a> {
    tag: &'a RawTag,
    interest: Interest,
    rx: Option<oneshot::Receiver<Status>>,
}

impl<'a> Operation<'a> {
    pub fn new(tag: &'a RawTag, interest: Interest) -> Self {
        Self {
            tag,
            interest,
            rx: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.rx = Some(rx);
        park(self.tag, tx, self.interest);
        let mut status = match self.interest {
            Interest::Read => self.tag.read(0),
            Interest::Write => self.tag.write(0),
        };
        if status.is_pending() {
            match self.rx.take() {
                Some(rx) => {
                    status = rx.await.unwrap_or(Status::Err(ERR_ABORT));
                }
                None => unreachable!(),
            }
        } else {
            self.rx = None;
        }
        status.into_result()?;
        Ok(())
    }
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        // cancelled mid-flight: do not leave the op dangling on the tag
        if self.rx.is_some() {
            let _ = self.tag.abort();
        }
    }
}
