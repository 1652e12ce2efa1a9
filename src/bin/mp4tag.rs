use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use mp4tag::{Mp4Tag, SimpleTag, TagCollection, TargetType, WriteOptions, util::hex_preview};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(version, about = "Read and edit iTunes-style MP4/M4A metadata")]
struct Cli {
    /// Log box scanning and write decisions to stderr
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every tag in the file
    Show {
        path: PathBuf,

        /// Emit JSON instead of text
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,

        /// Bytes of binary values to preview (0 hides them)
        #[arg(long, default_value_t = 32)]
        bytes: usize,
    },
    /// Print the value of one tag
    Get { path: PathBuf, name: String },
    /// Set one tag, keeping the others
    Set {
        path: PathBuf,
        name: String,
        value: String,

        /// Free space reserved after the item list if the file is rebuilt
        #[arg(long, default_value_t = 0)]
        padding: u32,
    },
    /// Remove one tag, keeping the others
    Remove { path: PathBuf, name: String },
    /// Replace the cover art with an image file
    Cover {
        path: PathBuf,
        image: PathBuf,

        #[arg(long, default_value_t = 0)]
        padding: u32,
    },
    /// Print where the metadata boxes are located
    Boxes {
        path: PathBuf,

        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    file: String,
    version: &'static str,
    tags: &'a TagCollection,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose { "mp4tag=debug".to_string() } else { "mp4tag=warn".to_string() }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Show { path, json, bytes } => show(&path, json, bytes),
        Command::Get { path, name } => {
            let mut tag = open(&path, false)?;
            println!("{}", tag.read_tag_string(&name).with_context(|| format!("reading {}", name))?);
            Ok(())
        }
        Command::Set { path, name, value, padding } => {
            let mut tag = open(&path, true)?;
            tag.set_write_options(WriteOptions { padding });
            tag.set_tag_string(&name, Some(&value)).with_context(|| format!("setting {}", name))?;
            report(&tag);
            Ok(())
        }
        Command::Remove { path, name } => {
            let mut tag = open(&path, true)?;
            tag.remove_tag(&name).with_context(|| format!("removing {}", name))?;
            report(&tag);
            Ok(())
        }
        Command::Cover { path, image, padding } => {
            let data = std::fs::read(&image).with_context(|| format!("reading {}", image.display()))?;
            let mut tag = open(&path, true)?;
            tag.set_write_options(WriteOptions { padding });

            let mut coll = match tag.read_tags() {
                Ok(existing) => existing.without("COVER_ART"),
                Err(mp4tag::Error::NoTags) => TagCollection::new(),
                Err(e) => return Err(e.into()),
            };
            if coll.is_empty() {
                coll.add_tag(TargetType::Album);
            }
            coll.tags[0].push(SimpleTag::with_binary("COVER_ART", data));
            tag.write_tags(&coll)?;
            report(&tag);
            Ok(())
        }
        Command::Boxes { path, json } => {
            let tag = open(&path, false)?;
            let info = tag.structure()?;
            if json {
                println!("{}", serde_json::to_string_pretty(info)?);
            } else {
                println!("file size: {}", info.file_size);
                let spans = [
                    ("ftyp", info.ftyp),
                    ("moov", Some(info.moov)),
                    ("mdat", info.mdat),
                    ("udta", info.udta),
                    ("meta", info.meta),
                    ("ilst", info.ilst),
                    ("free", info.free_after_ilst),
                ];
                for (name, span) in spans {
                    match span {
                        Some(s) => println!("{:<4}  offset {:>10}  size {:>10}", name, s.offset, s.size),
                        None => println!("{:<4}  -", name),
                    }
                }
                println!("hdlr  {}", if info.meta_has_hdlr { "present" } else { "-" });
            }
            Ok(())
        }
    }
}

fn open(path: &Path, writable: bool) -> anyhow::Result<Mp4Tag> {
    let mut tag = Mp4Tag::new();
    let res = if writable { tag.open_rw(path) } else { tag.open(path) };
    res.with_context(|| format!("opening {}", path.display()))?;
    Ok(tag)
}

fn report(tag: &Mp4Tag) {
    if let Some(strategy) = tag.last_write() {
        eprintln!("written ({:?})", strategy);
    }
}

fn show(path: &Path, json: bool, bytes: usize) -> anyhow::Result<()> {
    let mut tag = open(path, false)?;
    let coll = match tag.read_tags() {
        Ok(c) => c.clone(),
        Err(mp4tag::Error::NoTags) => TagCollection::new(),
        Err(e) => return Err(e.into()),
    };

    if json {
        let out = ShowOutput { file: path.display().to_string(), version: mp4tag::version(), tags: &coll };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if coll.simple_tags().next().is_none() {
        println!("(no tags)");
        return Ok(());
    }
    for st in coll.simple_tags() {
        match (&st.value, &st.binary) {
            (Some(v), _) => println!("{:<18} {}", st.name, v),
            (None, Some(b)) => {
                println!("{:<18} <{} bytes>", st.name, b.len());
                if bytes > 0 {
                    print!("{}", hex_preview(b, bytes));
                }
            }
            (None, None) => println!("{:<18}", st.name),
        }
    }
    Ok(())
}
