//! Blows away the media database and rebuilds it from scratch by shelling
//! out to `scan_media`. Grounded in the original `rescan.py`, which does
//! the same thing via `subprocess.call`.

struct Args {
    db: String,
    music: String,
    stations: String,
    verbose: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut db = "./radio.db".to_string();
    let mut music = "~/media/music".to_string();
    let mut stations = "./stations/*.toml".to_string();
    let mut verbose = false;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--db" => db = iter.next().ok_or_else(|| anyhow::anyhow!("--db requires a value"))?,
            "--music" => music = iter.next().ok_or_else(|| anyhow::anyhow!("--music requires a value"))?,
            "--stations" => stations = iter.next().ok_or_else(|| anyhow::anyhow!("--stations requires a value"))?,
            "--verbose" => verbose = true,
            other => return Err(anyhow::anyhow!("unrecognized argument: {other}")),
        }
    }

    Ok(Args { db, music, stations, verbose })
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;

    let db_path = std::path::Path::new(&args.db);
    if db_path.exists() {
        println!("Removing existing database: {}", args.db);
        std::fs::remove_file(db_path)?;
    } else {
        println!("No existing database at {}", args.db);
    }

    let exe = std::env::current_exe()?;
    let scan_media_bin = exe
        .parent()
        .ok_or_else(|| anyhow::anyhow!("could not resolve sibling binary directory"))?
        .join(if cfg!(windows) { "scan_media.exe" } else { "scan_media" });

    let mut cmd = std::process::Command::new(scan_media_bin);
    cmd.arg("--db").arg(&args.db);
    cmd.arg("--music").arg(&args.music);
    cmd.arg("--stations").arg(&args.stations);
    if args.verbose {
        cmd.arg("--verbose");
    }

    println!("Rescanning media...");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("scan_media exited with {status}");
    }

    println!("Rescan complete.");
    Ok(())
}
