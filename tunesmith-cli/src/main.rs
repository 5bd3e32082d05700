use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tunesmith_core::config::AppConfig;
use tunesmith_core::types::Attachment;
use tunesmith_engine::session::Session;
use tunesmith_runtime::config_store::ConfigStore;
use tunesmith_runtime::credentials::Credentials;
use tunesmith_runtime::defaults::default_config_path;
use tunesmith_runtime::factory::RuntimeCollaborators;

/// Send images, audio or text to the model and get back a melody plus matching albums.
#[derive(Debug, Parser)]
#[command(name = "tunesmith", version, about)]
struct Args {
    /// JSON config file; defaults are used when it does not exist
    #[arg(long, env = "TUNESMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory for per-session uploads (overrides the config)
    #[arg(long, env = "TUNESMITH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Read one turn per line from stdin (`reset` and `quit` are commands)
    #[arg(long, short)]
    interactive: bool,

    /// Reset the session before exiting, deleting its uploads
    #[arg(long)]
    reset: bool,

    /// Save the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Attachments for a single turn
    attachments: Vec<PathBuf>,
}

fn read_attachment(path: &Path) -> anyhow::Result<Attachment> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read attachment: {}", path.display()))?;
    let name = path
        .file_name()
        .with_context(|| format!("not a file: {}", path.display()))?
        .to_string_lossy()
        .into_owned();
    Ok(Attachment::new(name, bytes))
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(args: &Args) -> anyhow::Result<(ConfigStore, AppConfig)> {
    let store = ConfigStore::at_path(args.config.clone().unwrap_or_else(default_config_path));
    let mut cfg = store.load_or_default()?;
    if let Some(dir) = &args.workspace {
        cfg.workspace_dir = dir.clone();
    }
    Ok((store, cfg))
}

async fn run_turn(session: &mut Session, paths: &[PathBuf]) -> anyhow::Result<()> {
    let attachments = paths
        .iter()
        .map(|p| read_attachment(p))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let record = session
        .submit_with_hook(attachments, |stage| async move {
            info!(stage, "turn progress");
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

async fn interactive<R>(session: &mut Session, input: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => {
                if let Err(e) = session.reset().await {
                    warn!("reset failed: {e:#}");
                }
            }
            paths => {
                let paths: Vec<PathBuf> = paths.split_whitespace().map(PathBuf::from).collect();
                // A failed turn leaves the session usable.
                if let Err(e) = run_turn(session, &paths).await {
                    warn!("turn failed: {e:#}");
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (store, cfg) = load_config(&args)?;
    if args.write_config {
        store.save(&cfg)?;
        info!(path = %store.path().display(), "config written");
        return Ok(());
    }

    let factory = Arc::new(RuntimeCollaborators::new(cfg.clone(), Credentials::load()));
    let mut session = Session::open(&cfg.workspace_dir, factory, &cfg.pipeline)?;
    info!(session = %session.id(), workspace = %session.workspace().root().display(), "session opened");

    let outcome = if args.interactive {
        interactive(&mut session, BufReader::new(tokio::io::stdin())).await
    } else {
        run_turn(&mut session, &args.attachments).await
    };

    if args.reset {
        session.reset().await?;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_attachments() {
        let args = Args::try_parse_from([
            "tunesmith",
            "--workspace",
            "/tmp/ws",
            "--reset",
            "cover.png",
            "clip.mp3",
        ])
        .unwrap();
        assert_eq!(args.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(args.reset);
        assert!(!args.interactive);
        assert_eq!(
            args.attachments,
            vec![PathBuf::from("cover.png"), PathBuf::from("clip.mp3")]
        );
    }

    #[test]
    fn written_config_reloads_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("tunesmith.json");
        let args = Args::try_parse_from([
            "tunesmith",
            "--config",
            config.to_str().unwrap(),
            "--workspace",
            "/srv/uploads",
            "--write-config",
        ])
        .unwrap();
        assert!(args.write_config);

        let (store, cfg) = load_config(&args).unwrap();
        assert_eq!(cfg.workspace_dir, PathBuf::from("/srv/uploads"));
        store.save(&cfg).unwrap();

        let reloaded = ConfigStore::at_path(&config).load().unwrap();
        assert_eq!(reloaded, cfg);
        assert_eq!(reloaded.pipeline, AppConfig::default().pipeline);
    }

    #[tokio::test]
    async fn interactive_loop_survives_a_failed_reset() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("session");
        let workspace = tunesmith_engine::workspace::Workspace::open(&root).unwrap();
        let factory = Arc::new(RuntimeCollaborators::new(
            AppConfig::default(),
            Credentials::default(),
        ));
        let mut session = Session::new(workspace, factory, &AppConfig::default().pipeline);

        // A file where the workspace directory should be makes clearing it fail.
        std::fs::remove_dir(&root).unwrap();
        std::fs::write(&root, "not a directory").unwrap();
        assert!(session.reset().await.is_err());

        let script: &[u8] = b"reset\nreset\nquit\n";
        interactive(&mut session, script).await.unwrap();
    }

    #[test]
    fn reads_attachment_under_its_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let attachment = read_attachment(&path).unwrap();
        assert_eq!(attachment.name, "notes.txt");
        assert_eq!(attachment.bytes, b"hello");
    }

    #[test]
    fn missing_attachment_is_an_error() {
        let err = read_attachment(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(format!("{err:#}").contains("here.png"));
    }
}
