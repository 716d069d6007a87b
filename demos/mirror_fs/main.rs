use std::path::PathBuf;
use std::sync::Arc;

use nfs4_mamont::config::ServerConfig;
use nfs4_mamont::fs_util::{ensure_directory_is_writable, fully_delete_contents};
use nfs4_mamont::tcp::{NFSTcp, NFSTcpListener};

mod store;

const HOSTPORT: u32 = 11111;

/// Serves a local directory over NFSv4.
///
/// Mount with e.g. `mount -t nfs -o vers=4.0,port=11111 127.0.0.1:/ /mnt`.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    let mut bind_address = format!("127.0.0.1:{HOSTPORT}");
    let mut fresh = false;
    let mut path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => match args.next() {
                Some(address) => bind_address = address,
                None => {
                    eprintln!("--bind needs an ip:port argument");
                    std::process::exit(2);
                }
            },
            "--fresh" => fresh = true,
            "--help" | "-h" => {
                eprintln!(
                    "Usage: mirrorfs [--bind IP:PORT] [--fresh] <DIRECTORY>\n\
                     \n\
                     Options:\n\
                       --bind IP:PORT  Address to listen on (default: 127.0.0.1:{HOSTPORT})\n\
                       --fresh         Empty DIRECTORY before serving it\n\
                       -h, --help      Show this help and exit"
                );
                return;
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown flag: {arg}");
                eprintln!("Run with --help for usage.");
                std::process::exit(2);
            }
            _ => {
                if path.is_some() {
                    eprintln!("Unexpected extra argument: {arg}");
                    eprintln!("Run with --help for usage.");
                    std::process::exit(2);
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let path = path.expect("must supply directory to mirror");
    if let Err(e) = ensure_directory_is_writable(&path) {
        eprintln!("Cannot export {}: {e}", path.display());
        std::process::exit(1);
    }
    if fresh {
        fully_delete_contents(&path).expect("emptying export directory");
    }
    let store = Arc::new(store::MirrorStore::new(path));
    let config = ServerConfig::default().with_bind_address(&bind_address);
    let listener = NFSTcpListener::bind_with_config(config, store).await.unwrap();
    listener.handle_forever().await.unwrap();
}
