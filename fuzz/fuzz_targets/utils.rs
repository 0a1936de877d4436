use std::str;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

pub const MAX_INPUT_SIZE: usize = 256 * 1024;

const TIMEOUT: Duration = Duration::from_secs(1);

/// Returns a UTF-8 view of `data` truncated to `MAX_INPUT_SIZE`.
///
/// If the truncated data is not valid UTF-8, we only try trimming up to 3
/// bytes to recover from cutting a multibyte codepoint.
#[inline]
pub fn truncate_utf8(data: &[u8]) -> Option<&str> {
    let cap = data.len().min(MAX_INPUT_SIZE);
    for trim in 0..=3 {
        if cap < trim {
            break;
        }
        let slice = &data[..cap - trim];
        if let Ok(text) = str::from_utf8(slice) {
            return Some(text);
        }
    }
    None
}

/// Runs every input on one worker thread so that a hang is reported as a
/// timeout instead of stalling the fuzzer.
pub struct Runner {
    name: &'static str,
    input_tx: mpsc::SyncSender<String>,
    output_rx: Mutex<mpsc::Receiver<()>>,
}

impl Runner {
    pub fn new(name: &'static str, run_one: fn(&str)) -> Self {
        let (input_tx, input_rx) = mpsc::sync_channel::<String>(0);
        let (output_tx, output_rx) = mpsc::sync_channel::<()>(0);

        std::thread::spawn(move || {
            for input in input_rx {
                run_one(&input);
                let _ = output_tx.send(());
            }
        });

        Runner {
            name,
            input_tx,
            output_rx: Mutex::new(output_rx),
        }
    }

    pub fn run(&self, data: &[u8]) {
        let Some(text) = truncate_utf8(data) else {
            return;
        };
        self.input_tx
            .send(text.to_owned())
            .unwrap_or_else(|_| panic!("{} worker thread exited", self.name));

        match self
            .output_rx
            .lock()
            .unwrap_or_else(|_| panic!("{} worker receiver poisoned", self.name))
            .recv_timeout(TIMEOUT)
        {
            Ok(()) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => panic!("{} fuzz target timed out", self.name),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                panic!("{} worker thread panicked", self.name)
            }
        }
    }
}
