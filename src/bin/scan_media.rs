//! Scans a song library and per-station ident/commercial/overlay
//! directories into the media database. Grounded in the original
//! `radio/scan_media.py`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use dial_radio::config::load_station_toml;
use dial_radio::models::{Media, MediaKind, StationConfig};
use dial_radio::services::Store;

struct Args {
    db: String,
    music: String,
    stations: Vec<String>,
    verbose: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut db = "./radio.db".to_string();
    let mut music = None;
    let mut stations = Vec::new();
    let mut verbose = false;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--db" => db = iter.next().ok_or_else(|| anyhow::anyhow!("--db requires a value"))?,
            "--music" => music = Some(iter.next().ok_or_else(|| anyhow::anyhow!("--music requires a value"))?),
            "--stations" => {
                while let Some(next) = iter.next() {
                    if next.starts_with("--") {
                        return Err(anyhow::anyhow!("expected station path, got flag {next}"));
                    }
                    stations.push(next);
                }
            }
            "--verbose" => verbose = true,
            other => return Err(anyhow::anyhow!("unrecognized argument: {other}")),
        }
    }

    Ok(Args {
        db,
        music: music.ok_or_else(|| anyhow::anyhow!("--music is required"))?,
        stations,
        verbose,
    })
}

fn parse_artist_title(file_name: &str) -> (Option<String>, Option<String>) {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .trim();
    if let Some((a, t)) = stem.split_once(" - ") {
        let a = a.trim();
        let t = t.trim();
        (
            if a.is_empty() { None } else { Some(a.to_string()) },
            if t.is_empty() { None } else { Some(t.to_string()) },
        )
    } else {
        (None, if stem.is_empty() { None } else { Some(stem.to_string()) })
    }
}

fn duration_s(path: &Path) -> f64 {
    use lofty::prelude::AudioFile;

    match lofty::probe::Probe::open(path).and_then(|p| p.read()) {
        Ok(tagged) => tagged.properties().duration().as_secs_f64(),
        Err(_) => 0.0,
    }
}

/// Expands a leading `~` to the user's home directory, without a dedicated
/// crate for what is otherwise a single substitution.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    } else if path == "~" {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(path)
}

fn mtime(path: &Path) -> f64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn iter_mp3(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if !root.exists() {
        return out;
    }
    walk(root, &mut out);
    out
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some("mp3") {
            out.push(path);
        }
    }
}

/// Re-reads the file's duration via lofty unless an existing row for this
/// path already has the same mtime, in which case the stored duration is
/// reused.
async fn duration_s_cached(store: &Store, path: &Path, mtime_val: f64) -> anyhow::Result<f64> {
    let path_str = path.to_string_lossy().to_string();
    if let Some(existing) = store.media_by_path(&path_str).await? {
        if existing.mtime == Some(mtime_val) {
            return Ok(existing.duration_s.unwrap_or(0.0));
        }
    }
    Ok(duration_s(path))
}

async fn scan_songs(store: &Store, music_root: &str, verbose: bool) -> anyhow::Result<(usize, usize)> {
    let root = expand_tilde(music_root);
    let mut seen = 0;
    let mut scanned = 0;

    for path in iter_mp3(&root) {
        seen += 1;
        let tag = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|s| s.to_string());
        let (artist, title) = parse_artist_title(&path.file_name().and_then(|n| n.to_str()).unwrap_or_default());
        let mtime_val = mtime(&path);
        let media = Media {
            id: 0,
            path: path.to_string_lossy().to_string(),
            kind: MediaKind::Song,
            artist,
            title,
            tag,
            duration_s: Some(duration_s_cached(store, &path, mtime_val).await?),
            mtime: Some(mtime_val),
        };
        let id = store.upsert_media(&media).await?;
        if verbose {
            println!(
                "[song] {:>10}  {}  ({:.1}s)  id={id}",
                media.tag.as_deref().unwrap_or(""),
                path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
                media.duration_s.unwrap_or(0.0)
            );
        }
        scanned += 1;
    }

    Ok((seen, scanned))
}

async fn scan_station_media_dir(
    store: &Store,
    station_id: i64,
    directory: &str,
    kind: MediaKind,
    verbose: bool,
) -> anyhow::Result<(usize, usize)> {
    if directory.is_empty() {
        return Ok((0, 0));
    }
    let dir = expand_tilde(directory);
    if !dir.exists() {
        return Ok((0, 0));
    }

    let mut seen = 0;
    let mut scanned = 0;
    for path in iter_mp3(&dir) {
        seen += 1;
        let title = path.file_stem().and_then(|s| s.to_str()).map(|s| s.to_string());
        let mtime_val = mtime(&path);
        let media = Media {
            id: 0,
            path: path.to_string_lossy().to_string(),
            kind,
            artist: None,
            title,
            tag: None,
            duration_s: Some(duration_s_cached(store, &path, mtime_val).await?),
            mtime: Some(mtime_val),
        };
        let media_id = store.upsert_media(&media).await?;
        store.link_station_media(station_id, media_id).await?;
        if verbose {
            println!(
                "[{:<10}] {} ({:.1}s) id={media_id} linked->station {station_id}",
                kind.as_str(),
                path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
                media.duration_s.unwrap_or(0.0)
            );
        }
        scanned += 1;
    }

    Ok((seen, scanned))
}

async fn scan_schedule_overlays(store: &Store, station_id: i64, cfg: &StationConfig, verbose: bool) -> anyhow::Result<()> {
    let mut seen_dirs = HashSet::new();
    for (day, hours) in &cfg.schedule {
        for (hour, entry) in hours {
            let Some(dir) = &entry.overlays_dir else { continue };
            if dir.is_empty() || !seen_dirs.insert(dir.clone()) {
                continue;
            }

            let schedule_key = format!("{day}-{hour}");
            store
                .upsert_station_overlay(station_id, &schedule_key, dir, entry.overlays_probability)
                .await?;

            let (seen, scanned) = scan_station_media_dir(store, station_id, dir, MediaKind::Overlay, verbose).await?;
            println!("  overlays {schedule_key}: seen={seen}, scanned={scanned}");
        }
    }
    Ok(())
}

fn load_station_cfgs(patterns: &[String]) -> anyhow::Result<Vec<StationConfig>> {
    let mut cfgs = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.exists() {
            cfgs.push(load_station_toml(path)?);
            continue;
        }
        for p in dial_radio::config::resolve_station_glob(pattern)? {
            cfgs.push(load_station_toml(&p)?);
        }
    }
    Ok(cfgs)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let store = Store::open(&args.db).await?;
    println!("DB: {}", args.db);

    println!("Scanning songs under: {}", args.music);
    let (s_seen, s_up) = scan_songs(&store, &args.music, args.verbose).await?;
    println!("Songs: seen={s_seen}, scanned={s_up}");

    for cfg in load_station_cfgs(&args.stations)? {
        let sid = store.upsert_station(&cfg).await?;
        println!("Station upserted: {} @ {:.1} FM (id={sid})", cfg.name, cfg.freq);

        let (i_seen, i_up) = scan_station_media_dir(&store, sid, &cfg.idents_dir, MediaKind::Ident, args.verbose).await?;
        let (c_seen, c_up) =
            scan_station_media_dir(&store, sid, &cfg.commercials_dir, MediaKind::Commercial, args.verbose).await?;
        println!("  idents: seen={i_seen}, scanned={i_up}");
        println!("  commercials: seen={c_seen}, scanned={c_up}");

        if let Some(toth_dir) = &cfg.top_of_the_hour {
            let (t_seen, t_up) = scan_station_media_dir(&store, sid, toth_dir, MediaKind::TopOfHour, args.verbose).await?;
            println!("  top_of_hour: seen={t_seen}, scanned={t_up}");
        }

        scan_schedule_overlays(&store, sid, &cfg, args.verbose).await?;
    }

    println!("Done.");
    Ok(())
}
