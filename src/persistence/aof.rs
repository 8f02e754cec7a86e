//! Append-only command log (spec §4.8). Each write-classified command
//! is appended as a RESP multibulk array of bulk strings -- exactly the
//! wire form a client would have sent -- which is what lets replay
//! reuse the ordinary command parser (spec §4.8 "Replay fidelity").
//! Grounded on the teacher's `aof.rs`, whose `load_append_only_file`
//! already parses this same `*N\r\n$len\r\n...` framing by hand; here
//! that parsing is delegated to the shared RESP codec instead of a
//! bespoke line reader.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use bytes::Bytes;

use crate::protocol::{self, Parsed};

pub fn encode_command(argv: &[Bytes]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", argv.len()).into_bytes();
    for arg in argv {
        out.extend_from_slice(&protocol::encode_bulk(arg));
    }
    out
}

pub fn open_for_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn append(file: &mut File, argv: &[Bytes]) -> io::Result<()> {
    file.write_all(&encode_command(argv))
}

/// Parses every command frame in the AOF file in order. A trailing
/// incomplete frame (the process crashed mid-append) is tolerated and
/// silently dropped, matching real AOF recovery; any other malformed
/// frame is fatal (spec §4.8 "a failed AOF replay aborts startup").
pub fn read_commands(path: &Path) -> io::Result<Vec<Vec<Bytes>>> {
    let data = fs::read(path)?;
    let mut commands = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        match protocol::try_parse_one(&data[offset..]) {
            Parsed::Command { argv, consumed } => {
                commands.push(argv);
                offset += consumed;
            }
            Parsed::Incomplete => break,
            Parsed::Malformed { reason, consumed } => {
                if consumed == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("corrupt AOF at byte {offset}: {reason}"),
                    ));
                }
                offset += consumed;
            }
        }
    }
    Ok(commands)
}

/// Writes `commands` (already RESP-array-encoded write commands, as
/// produced by rewrite planning) to a sibling temp file and atomically
/// renames it over the live AOF, the same pattern RDB save uses.
pub fn rewrite(path: &Path, commands: &[Vec<Bytes>]) -> io::Result<()> {
    let mut buf = Vec::with_capacity(commands.len() * 32);
    for argv in commands {
        buf.extend_from_slice(&encode_command(argv));
    }
    let mut tmp_os = path.as_os_str().to_owned();
    tmp_os.push(".rewrite.tmp");
    let tmp_path = std::path::PathBuf::from(tmp_os);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
