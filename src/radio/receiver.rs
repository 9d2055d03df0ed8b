/// Frame source fed by an external 868 MHz receiver bridge
use log::{debug, error, trace};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

use crate::radio::{Radio, RawFrame, Reception, FRAME_LEN};

// Failure codes reported through Reception::Failed
pub const ERR_IO: i32 = -1;
pub const ERR_FRAME_LENGTH: i32 = -2;
pub const ERR_HEX_DIGIT: i32 = -3;

/// Pause before reading again after the writer side closed
const EOF_BACKOFF: Duration = Duration::from_secs(1);

type Latest = Option<Result<RawFrame, i32>>;

/// Reads one hex-encoded 27-byte frame per line from a file or FIFO
///
/// The bridge (an SDR demodulator or a serial-attached CC1101) writes frames
/// with the sync byte first, e.g. `D4 EA EC 7F ...`. Whitespace is ignored.
///
/// A background task keeps the source drained so the bridge never blocks
/// and only the newest line is held. `receive` ignores whatever arrived
/// before it was called and waits for the next line.
pub struct HexFrameRadio {
    latest: watch::Receiver<Latest>,
    reader: JoinHandle<()>,
    receive_timeout: Duration,
}

impl HexFrameRadio {
    /// Open the frame source. Failure here means the station has no radio.
    pub async fn open(path: &Path, receive_timeout: Duration) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        debug!("Opened frame source {}", path.display());
        Ok(Self::from_reader(file, receive_timeout))
    }

    /// Follow any line-oriented source. Must be called inside the runtime.
    pub fn from_reader<R>(source: R, receive_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, latest) = watch::channel(None);
        let reader = tokio::spawn(follow(BufReader::new(source).lines(), tx));
        Self {
            latest,
            reader,
            receive_timeout,
        }
    }
}

impl Drop for HexFrameRadio {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn follow<R>(mut lines: Lines<R>, tx: watch::Sender<Latest>)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                trace!("Frame line: {}", line.trim());
                if tx.send(Some(parse_hex_frame(&line))).is_err() {
                    break;
                }
            }
            Ok(None) => {
                // Writer side closed; a restarted bridge reopens the FIFO
                if tx.is_closed() {
                    break;
                }
                sleep(EOF_BACKOFF).await;
            }
            Err(e) => {
                error!("Frame source read error: {}", e);
                let _ = tx.send(Some(Err(ERR_IO)));
                break;
            }
        }
    }
}

impl Radio for HexFrameRadio {
    async fn receive(&mut self, frame: &mut RawFrame) -> Reception {
        // Lines already held arrived while nobody was listening
        drop(self.latest.borrow_and_update());

        match timeout(self.receive_timeout, self.latest.changed()).await {
            Err(_) => Reception::Timeout,
            Ok(Err(_)) => {
                // Reader stopped; behave like a quiet channel
                sleep(self.receive_timeout).await;
                Reception::Timeout
            }
            Ok(Ok(())) => match *self.latest.borrow_and_update() {
                Some(Ok(bytes)) => {
                    *frame = bytes;
                    Reception::Received
                }
                Some(Err(code)) => Reception::Failed(code),
                None => Reception::Timeout,
            },
        }
    }
}

/// Parse a line of hex digits into a raw frame
pub fn parse_hex_frame(line: &str) -> Result<RawFrame, i32> {
    let digits: Vec<u8> = line
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() != FRAME_LEN * 2 {
        return Err(ERR_FRAME_LENGTH);
    }

    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(ERR_HEX_DIGIT);
    }

    let mut frame = [0u8; FRAME_LEN];
    for (byte, pair) in frame.iter_mut().zip(digits.chunks(2)) {
        *byte = (nibble(pair[0]) << 4) | nibble(pair[1]);
    }
    Ok(frame)
}

fn nibble(digit: u8) -> u8 {
    char::from(digit).to_digit(16).unwrap_or(0) as u8
}
