//! Interactive shell over a monfs image (§6).
//!
//! Thin by design: every command below is a one-line call into
//! [`monfs::Filesystem`]; parsing the command line and formatting the
//! output is all that lives here.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use monfs::{Filesystem, FsError, FsResult, InodeKind};

#[derive(Parser)]
#[command(name = "monfs-shell", about = "Interactive shell over a monfs image")]
struct Cli {
    /// Path to the partition image file.
    image: PathBuf,
    /// Create a fresh image instead of mounting an existing one.
    #[arg(long)]
    init: bool,
}

fn open(cli: &Cli) -> FsResult<Filesystem> {
    if cli.init || !cli.image.exists() {
        log::info!("creating a fresh image at {}", cli.image.display());
        Filesystem::initialize(&cli.image)
    } else {
        log::info!("mounting {}", cli.image.display());
        Filesystem::load(&cli.image)
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut fs = match open(&cli) {
        Ok(fs) => fs,
        Err(e) => {
            log::error!("could not open image: {e}");
            return ExitCode::FAILURE;
        }
    };

    run(&mut fs);

    match fs.save() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("final save failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(fs: &mut Filesystem) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("monfs> ");
        let _ = stdout.flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = words.first() else { continue };
        if cmd == "quit" {
            break;
        }
        if let Err(e) = dispatch(fs, cmd, &words[1..]) {
            println!("error: {e}");
        }
    }
}

fn dispatch(fs: &mut Filesystem, cmd: &str, args: &[&str]) -> FsResult<()> {
    match (cmd, args) {
        ("ls", []) => cmd_ls(fs),
        ("ls", ["-i", name]) => cmd_ls_inode(fs, name),
        ("cd", [name]) => fs.chdir(name),
        ("mkdir", [name]) => fs.create(name, InodeKind::Directory).map(|_| ()),
        ("touch", [name]) => fs.create(name, InodeKind::Regular).map(|_| ()),
        ("rm", [name]) => fs.unlink(name),
        ("cp", [src, dst]) => fs.copy(src, dst).map(|_| ()),
        ("mv", [src, dst]) => fs.rename(src, dst),
        ("cat", [name]) => cmd_cat(fs, name),
        ("write", [name]) => cmd_write(fs, name),
        ("ln", [src, dst]) => fs.link(src, dst).map(|_| ()),
        ("lns", [src, dst]) => fs.symlink(src, dst).map(|_| ()),
        ("chmod", [name, symbolic]) => cmd_chmod(fs, name, symbolic),
        ("save", [path]) => fs.backup(path),
        ("load", [path]) => fs.restore(path),
        ("defrag", []) => fs.defragment(),
        _ => Err(FsError::InvalidArgument("unrecognized command or argument count")),
    }
}

fn cmd_ls(fs: &mut Filesystem) -> FsResult<()> {
    let dir = fs.current_dir();
    for entry in fs.list(dir)? {
        println!(
            "{}{} {:>10} {} {}",
            kind_glyph(entry.kind),
            symbolic_mode(entry.mode),
            entry.size,
            entry.modified_at,
            entry.name,
        );
    }
    Ok(())
}

fn kind_glyph(kind: InodeKind) -> char {
    match kind {
        InodeKind::Regular => 'f',
        InodeKind::Directory => 'd',
        InodeKind::Symlink => 'l',
        InodeKind::Free => '?',
    }
}

fn cmd_ls_inode(fs: &mut Filesystem, name: &str) -> FsResult<()> {
    let id = fs.lookup(name)?;
    let inode = fs.stat(id)?;
    println!(
        "inode {id}: kind={:?} owner={} group={} mode={} size={} links={}",
        inode.kind, inode.owner, inode.group, symbolic_mode(inode.mode), inode.size, inode.link_count,
    );
    for block in fs.block_ids(id)? {
        let raw = fs.read_raw_block(block)?;
        let preview: String = raw.iter().take(16).map(|b| format!("{b:02x}")).collect();
        println!("  block {block}: {preview}...");
    }
    Ok(())
}

fn cmd_cat(fs: &mut Filesystem, name: &str) -> FsResult<()> {
    let id = fs.lookup(name)?;
    let size = fs.stat(id)?.size;
    let mut buf = vec![0u8; size as usize];
    let got = fs.read(id, 0, &mut buf)?;
    io::stdout()
        .write_all(&buf[..got])
        .map_err(FsError::Io)?;
    println!();
    Ok(())
}

/// Reads lines from stdin until one containing only "." and writes them,
/// newline-terminated, to `name` from offset zero (§6).
fn cmd_write(fs: &mut Filesystem, name: &str) -> FsResult<()> {
    let id = fs.lookup(name)?;
    let mut payload = Vec::new();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(FsError::Io)?;
        if line == "." {
            break;
        }
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');
    }
    fs.write(id, 0, &payload).map(|_| ())
}

fn cmd_chmod(fs: &mut Filesystem, name: &str, symbolic: &str) -> FsResult<()> {
    let mode = parse_symbolic_mode(symbolic)
        .ok_or(FsError::InvalidArgument("mode must be nine characters of r/w/x or -"))?;
    let id = fs.lookup(name)?;
    fs.chmod(id, mode)
}

/// Converts a nine-character symbolic string (e.g. `"rwxr-xr--"`) into the
/// low nine permission bits `chmod` expects.
fn parse_symbolic_mode(s: &str) -> Option<u16> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() != 9 {
        return None;
    }
    // Per §6: a matching letter sets its bit, any other character
    // (not just '-') clears it. Only the length is validated.
    let expected = ['r', 'w', 'x', 'r', 'w', 'x', 'r', 'w', 'x'];
    let mut mode = 0u16;
    for (i, &c) in chars.iter().enumerate() {
        if c == expected[i] {
            mode |= 1 << (8 - i);
        }
    }
    Some(mode)
}

fn symbolic_mode(mode: u16) -> String {
    let mut s = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0b100 != 0 { 'r' } else { '-' });
        s.push(if bits & 0b010 != 0 { 'w' } else { '-' });
        s.push(if bits & 0b001 != 0 { 'x' } else { '-' });
    }
    s
}
