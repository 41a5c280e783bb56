//! The SSFS command shell.
//!
//! Reads one command per line from standard input (or a script file) and
//! executes it against at most one mounted image. The process exits
//! non-zero if any command failed.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use ssfs::storage::FileBackedDisk;
use ssfs::{SsfsError, Volume};

/// Command-line arguments of the shell.
#[derive(Parser)]
#[command(version, about = "Operate on SSFS images")]
struct Args {
    /// Command script to run instead of standard input
    #[arg(long)]
    script: Option<PathBuf>,
}

/// The shell's only state: the volume mounted by a previous command, if any.
#[derive(Default)]
struct Shell {
    /// The currently mounted volume.
    volume: Option<Volume<FileBackedDisk>>,
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    let reader: Box<dyn BufRead> = match args.script {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("opening script {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let mut shell = Shell::default();
    let mut failures = 0;

    for line in reader.lines() {
        let line = line.context("reading command")?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        match shell.dispatch(line) {
            Ok(message) => println!("{message}"),
            Err(err) => {
                failures += 1;
                match err.downcast_ref::<SsfsError>() {
                    Some(fs_err) => eprintln!("error {}: {fs_err}", fs_err.code()),
                    None => eprintln!("error: {err}"),
                }
            }
        }
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

impl Shell {
    /// Runs a single command line, returning its success message.
    fn dispatch(&mut self, line: &str) -> Result<String> {
        let (command, rest) = next_token(line).context("empty command")?;

        match command {
            "format" => self.format(rest),
            "mount" => self.mount(rest),
            "unmount" => self.unmount(),
            "create" => self.create(),
            "delete" => self.delete(rest),
            "stat" => self.stat(rest),
            "read" => self.read(rest),
            "write" => self.write(rest),
            other => bail!("unknown command: {other}"),
        }
    }

    /// `format <image> <inodes>`
    fn format(&mut self, args: &str) -> Result<String> {
        let (image, rest) = next_token(args).context("usage: format <image> <inodes>")?;
        let (inodes, _) = next_token(rest).context("usage: format <image> <inodes>")?;
        let inodes: i64 = inodes.parse().context("inode count must be an integer")?;

        if self.volume.is_some() {
            return Err(SsfsError::DiskAlreadyMounted.into());
        }

        let disk = FileBackedDisk::open(image)?;
        Volume::format(&disk, inodes.clamp(1, u32::MAX as i64) as u32)?;

        Ok(format!("formatted {image} with {inodes} inodes"))
    }

    /// `mount <image>`
    fn mount(&mut self, args: &str) -> Result<String> {
        let (image, _) = next_token(args).context("usage: mount <image>")?;

        if self.volume.is_some() {
            return Err(SsfsError::DiskAlreadyMounted.into());
        }

        let disk = FileBackedDisk::open(image)?;
        self.volume = Some(Volume::mount(disk)?);

        Ok(format!("mounted {image}"))
    }

    /// `unmount`
    fn unmount(&mut self) -> Result<String> {
        let volume = self.volume.take().ok_or(SsfsError::DiskNotMounted)?;
        volume.unmount()?;

        Ok("unmounted".to_string())
    }

    /// `create`
    fn create(&mut self) -> Result<String> {
        let volume = self.volume.as_mut().ok_or(SsfsError::DiskNotMounted)?;
        let inum = volume.create()?;

        Ok(format!("created inode {inum}"))
    }

    /// `delete <inode>`
    fn delete(&mut self, args: &str) -> Result<String> {
        let (inum, _) = next_token(args).context("usage: delete <inode>")?;
        let inum = parse_inode(inum)?;

        let volume = self.volume.as_mut().ok_or(SsfsError::DiskNotMounted)?;
        volume.delete(inum)?;

        Ok(format!("deleted inode {inum}"))
    }

    /// `stat <inode>`
    fn stat(&mut self, args: &str) -> Result<String> {
        let (inum, _) = next_token(args).context("usage: stat <inode>")?;
        let inum = parse_inode(inum)?;

        let volume = self.volume.as_ref().ok_or(SsfsError::DiskNotMounted)?;
        let size = volume.stat(inum)?;

        Ok(format!("inode {inum} size: {size} bytes"))
    }

    /// `read <inode> <offset> <length>`
    fn read(&mut self, args: &str) -> Result<String> {
        let (inum, rest) = next_token(args).context("usage: read <inode> <offset> <length>")?;
        let (offset, rest) = next_token(rest).context("usage: read <inode> <offset> <length>")?;
        let (length, _) = next_token(rest).context("usage: read <inode> <offset> <length>")?;

        let inum = parse_inode(inum)?;
        let offset = parse_offset(offset)?;
        let length: i64 = length.parse().context("length must be an integer")?;

        let volume = self.volume.as_mut().ok_or(SsfsError::DiskNotMounted)?;

        let mut buf = vec![0; length.max(0) as usize];
        let count = volume.read(inum, &mut buf, offset)?;

        Ok(format!(
            "read {count} bytes from inode {inum} at offset {offset}: {}",
            String::from_utf8_lossy(&buf[..count])
        ))
    }

    /// `write <inode> <offset> <data>`. Everything after the offset token
    /// is the data, spaces included.
    fn write(&mut self, args: &str) -> Result<String> {
        let (inum, rest) = next_token(args).context("usage: write <inode> <offset> <data>")?;
        let (offset, data) = next_token(rest).context("usage: write <inode> <offset> <data>")?;

        let inum = parse_inode(inum)?;
        let offset = parse_offset(offset)?;

        let volume = self.volume.as_mut().ok_or(SsfsError::DiskNotMounted)?;
        let count = volume.write(inum, data.as_bytes(), offset)?;

        Ok(format!("wrote {count} bytes to inode {inum} at offset {offset}"))
    }
}

/// Splits off the first whitespace-separated token of `line`.
fn next_token(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }

    match line.split_once(char::is_whitespace) {
        Some((token, rest)) => Some((token, rest.trim_start())),
        None => Some((line, "")),
    }
}

/// Parses an inode number, reporting negatives as [`SsfsError::InvalidInode`].
fn parse_inode(token: &str) -> Result<u32> {
    let value: i64 = token.parse().context("inode number must be an integer")?;

    u32::try_from(value).map_err(|_| SsfsError::InvalidInode.into())
}

/// Parses a byte offset, reporting negatives as [`SsfsError::InvalidOffset`].
fn parse_offset(token: &str) -> Result<u64> {
    let value: i64 = token.parse().context("offset must be an integer")?;

    u64::try_from(value).map_err(|_| SsfsError::InvalidOffset.into())
}
