//! Serves regular files below a base directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use ember::config::Config;
use ember::{logging, sanitize_path, Log, Request, Response, StatusCode};

#[derive(Parser, Debug)]
#[command(about = "Serve static files over HTTP")]
struct Args {
    /// Directory to serve
    root: PathBuf,

    /// Port to listen on, overrides $PORT
    #[arg(short, long)]
    port: Option<u16>,
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "htm" | "html" | "shtml" | "xhtml" => "text/html",
        "xml" => "text/xml",
        "css" => "text/css",
        "js" => "text/javascript",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => return None,
    };
    Some(content_type)
}

/// Maps a request path onto `root`. The result never leaves `root`.
fn resolve(root: &Path, request_path: &str) -> PathBuf {
    let clean = sanitize_path(request_path);
    root.join(clean.trim_start_matches('/'))
}

fn handle(root: &Path, req: &mut Request<'_>, res: &mut Response<'_>) -> anyhow::Result<()> {
    Log::for_request(req).append(&req.method).append(' ').append(&req.path);

    let target = resolve(root, &req.path);
    let metadata = match std::fs::metadata(&target) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => {
            res.set_status(StatusCode::NotFound);
            return Ok(());
        }
    };

    let mut file = File::open(&target)
        .with_context(|| format!("opening {}", target.display()))?;

    if let Some(content_type) = content_type_for(&target) {
        res.set_content_type(content_type);
    }
    res.set_status(StatusCode::Ok)
        .header("Content-Length", metadata.len().to_string());

    std::io::copy(&mut file, res)
        .with_context(|| format!("sending {}", target.display()))?;
    Ok(())
}

fn main() -> ExitCode {
    logging::init();

    let args = Args::parse();
    let port = args.port.unwrap_or_else(|| Config::load().port);
    let root = args.root;

    if !root.is_dir() {
        Log::new().append("Not a directory: ").append(root.display());
        return ExitCode::FAILURE;
    }

    Log::new().append("Server started on port ").append(port);

    let code = ember::start(port, move |req, res| handle(&root, req, res));
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("index.HTML")), Some("text/html"));
        assert_eq!(content_type_for(Path::new("a/b/photo.jpe")), Some("image/jpeg"));
        assert_eq!(content_type_for(Path::new("archive.tar.gz")), None);
        assert_eq!(content_type_for(Path::new("README")), None);
    }

    #[test]
    fn resolve_stays_below_root() {
        let root = Path::new("/srv/www");
        assert_eq!(resolve(root, "/../../etc/passwd"), PathBuf::from("/srv/www/etc/passwd"));
        assert_eq!(resolve(root, "/docs/./a/../b.txt"), PathBuf::from("/srv/www/docs/b.txt"));
        assert_eq!(resolve(root, "/"), PathBuf::from("/srv/www/"));
    }
}
