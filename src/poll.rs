// mqa-rest - CLI tools for the MQ Appliance REST management interface
// Copyright (C) 2024 mqa-rest contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Runs a task at a fixed interval until cancelled.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
    max_ticks: Option<u64>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Calls `tick` immediately and then once per interval. Returns the
    /// number of completed ticks once `cancel` fires or the tick limit is hit.
    /// A disconnected `cancel` channel no longer stops the loop.
    pub fn run<F>(&self, cancel: &Receiver<()>, mut tick: F) -> Result<u64>
    where
        F: FnMut() -> Result<()>,
    {
        let limit_reached = |ticks: u64| self.max_ticks.is_some_and(|max| ticks >= max);
        let mut ticks = 0;
        let mut listening = true;
        loop {
            if limit_reached(ticks) {
                return Ok(ticks);
            }
            tick()?;
            ticks += 1;
            if limit_reached(ticks) {
                return Ok(ticks);
            }

            if listening {
                match cancel.recv_timeout(self.interval) {
                    Ok(()) => {
                        debug!(ticks, "polling cancelled");
                        return Ok(ticks);
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        listening = false;
                        thread::sleep(self.interval);
                    }
                }
            } else {
                thread::sleep(self.interval);
            }
        }
    }
}

/// Signals once when the operator presses Enter. End of input drops the
/// sender without signalling.
pub fn cancel_on_enter() -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        if let Ok(n) = std::io::stdin().lock().read_line(&mut line)
            && n > 0
        {
            let _ = tx.send(());
        }
    });
    rx
}
