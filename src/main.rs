use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use docportal::file::format_size;
use docportal::{
    Config, FileRecord, Folder, ImportEvent, ImportOptions, PortalError, Result, Store,
    TransferService,
};

/// Command-line arguments for docportal
#[derive(Parser, Debug)]
#[command(
    name = "docportal",
    version = env!("CARGO_PKG_VERSION"),
    about = "Browse and manage the document portal"
)]
struct Args {
    /// Configuration file (built-in defaults when missing)
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Administrator login, required by commands that modify the portal
    #[arg(long, global = true)]
    user: Option<String>,

    /// Administrator password
    #[arg(long, global = true)]
    password: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the subfolders of a folder (root folders by default)
    Folders {
        #[arg(long)]
        parent: Option<i64>,
        /// List every folder instead
        #[arg(long, conflicts_with = "parent")]
        all: bool,
    },
    /// List the files of a folder, newest first
    Files {
        folder: i64,
        /// Also print the recursive file count
        #[arg(long)]
        count: bool,
    },
    /// Print the breadcrumb of a folder
    Path { folder: i64 },
    /// Check administrator credentials
    Login,
    /// Create a folder
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<i64>,
    },
    /// Rename a folder
    Rename { folder: i64, name: String },
    /// Delete a folder, its subfolders and their files
    Rmdir { folder: i64 },
    /// Upload files into a folder
    Upload {
        folder: i64,
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },
    /// Delete a file
    Rm { file: i64 },
    /// Import a directory tree (Ctrl-C cancels)
    Import {
        source: PathBuf,
        #[arg(long)]
        parent: Option<i64>,
    },
    /// Open a file with the default application
    Open { file: i64 },
    /// Save a copy of a file to a path or into a directory
    Get { file: i64, dest: PathBuf },
}

impl Command {
    fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Mkdir { .. }
                | Command::Rename { .. }
                | Command::Rmdir { .. }
                | Command::Upload { .. }
                | Command::Rm { .. }
                | Command::Import { .. }
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = docportal::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        docportal::logging::init_console_only(&config.logging.level);
    }

    match run(args, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: &Config) -> Result<()> {
    let store = Store::open(config).await?;
    let transfer = TransferService::new(&config.storage.upload_dir);
    transfer.ensure_storage_root()?;

    let needs_login = args.command.is_mutating() || matches!(args.command, Command::Login);
    if needs_login {
        let (Some(user), Some(password)) = (args.user.as_deref(), args.password.as_deref()) else {
            return Err(PortalError::Auth(
                "--user and --password are required".to_string(),
            ));
        };
        if !store.authenticate(user, password).await? {
            return Err(PortalError::Auth("invalid credentials".to_string()));
        }
    }

    let out = Output { json: args.json };
    let result = execute(args.command, &store, &transfer, &out).await;
    store.close().await;
    result
}

async fn execute(
    command: Command,
    store: &Store,
    transfer: &TransferService,
    out: &Output,
) -> Result<()> {
    match command {
        Command::Folders { parent, all } => {
            let folders = if all {
                store.get_all_folders().await?
            } else {
                store.get_subfolders(parent).await?
            };
            out.folders(&folders)
        }
        Command::Files { folder, count } => {
            let files = store.get_files_in_folder(folder).await?;
            if !count {
                return out.files(&files);
            }
            let total = store.count_files(folder, true).await?;
            if out.json {
                return out.value(&FileListing {
                    files: &files,
                    total,
                });
            }
            out.files(&files)?;
            println!("{total} file(s) in subtree");
            Ok(())
        }
        Command::Path { folder } => {
            let path = store.get_folder_path(folder).await?;
            if path.is_empty() {
                return Err(PortalError::NotFound(format!("folder {folder}")));
            }
            if out.json {
                return out.value(&path);
            }
            let names: Vec<_> = path.iter().map(|f| f.name.as_str()).collect();
            println!("{}", names.join(" / "));
            Ok(())
        }
        Command::Login => {
            println!("credentials ok");
            Ok(())
        }
        Command::Mkdir { name, parent } => {
            let id = store.create_folder(&name, parent).await?;
            println!("created folder {id}");
            Ok(())
        }
        Command::Rename { folder, name } => {
            if !store.rename_folder(folder, &name).await? {
                return Err(PortalError::NotFound(format!("folder {folder}")));
            }
            println!("renamed folder {folder}");
            Ok(())
        }
        Command::Rmdir { folder } => {
            if !store.delete_folder(folder).await? {
                return Err(PortalError::NotFound(format!("folder {folder}")));
            }
            println!("deleted folder {folder}");
            Ok(())
        }
        Command::Upload { folder, sources } => {
            let mut uploaded = Vec::with_capacity(sources.len());
            for source in &sources {
                uploaded.push(transfer.upload_file(store, folder, source).await?);
            }
            out.files(&uploaded)
        }
        Command::Rm { file } => {
            if !store.delete_file(file).await? {
                return Err(PortalError::NotFound(format!("file {file}")));
            }
            println!("deleted file {file}");
            Ok(())
        }
        Command::Import { source, parent } => import(store, transfer, source, parent, out).await,
        Command::Open { file } => {
            let record = store
                .get_file(file)
                .await?
                .ok_or_else(|| PortalError::NotFound(format!("file {file}")))?;
            if !transfer.open_with_default_handler(std::path::Path::new(&record.storage_path)) {
                return Err(PortalError::Transfer(format!(
                    "cannot open {}",
                    record.storage_path
                )));
            }
            Ok(())
        }
        Command::Get { file, dest } => {
            let record = store
                .get_file(file)
                .await?
                .ok_or_else(|| PortalError::NotFound(format!("file {file}")))?;
            let saved = transfer.export_file(&record, &dest)?;
            if out.json {
                return out.value(&serde_json::json!({
                    "file": file,
                    "path": saved.to_string_lossy(),
                }));
            }
            println!("saved {}", saved.display());
            Ok(())
        }
    }
}

/// Run an import on its own task, printing progress until it finishes.
async fn import(
    store: &Store,
    transfer: &TransferService,
    source: PathBuf,
    parent: Option<i64>,
    out: &Output,
) -> Result<()> {
    if !source.is_dir() {
        return Err(PortalError::Validation(format!(
            "{} is not a directory",
            source.display()
        )));
    }

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let options = ImportOptions {
        cancel: cancel.clone(),
        progress: Some(tx),
    };

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling import");
                cancel.cancel();
            }
        })
    };

    let task = {
        let store = store.clone();
        let transfer = transfer.clone();
        tokio::spawn(async move {
            transfer
                .import_tree_with(&store, &source, parent, &options)
                .await
        })
    };

    while let Some(event) = rx.recv().await {
        if out.json {
            continue;
        }
        match event {
            ImportEvent::FolderCreated { folder_id, name, .. } => {
                println!("📁 {name} ({folder_id})");
            }
            ImportEvent::FileImported { filename, icon, .. } => println!("  {icon} {filename}"),
            ImportEvent::Skipped { path, reason } => {
                println!("  skipped {}: {reason}", path.display());
            }
        }
    }

    let report = task
        .await
        .map_err(|e| PortalError::Transfer(format!("import task failed: {e}")))?;
    ctrl_c.abort();
    debug!(?report, "Import report");

    if out.json {
        return out.value(&report);
    }
    println!(
        "{} file(s) imported into {} folder(s), {} failure(s){}",
        report.files_imported,
        report.folders_created,
        report.failures.len(),
        if report.cancelled { ", cancelled" } else { "" }
    );
    Ok(())
}

/// `files --count` in JSON mode.
#[derive(Serialize)]
struct FileListing<'a> {
    files: &'a [FileRecord],
    total: i64,
}

struct Output {
    json: bool,
}

impl Output {
    fn value<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| PortalError::Validation(format!("cannot encode output: {e}")))?;
        println!("{text}");
        Ok(())
    }

    fn folders(&self, folders: &[Folder]) -> Result<()> {
        if self.json {
            return self.value(folders);
        }
        for folder in folders {
            println!("{:>6}  📁 {}", folder.id, folder.name);
        }
        Ok(())
    }

    fn files(&self, files: &[FileRecord]) -> Result<()> {
        if self.json {
            return self.value(files);
        }
        for file in files {
            println!(
                "{:>6}  {} {}  {}  {}",
                file.id,
                docportal::classify_icon(&file.extension()),
                file.filename,
                format_size(file.size()),
                docportal::datetime::format_local(&file.uploaded_at, "%Y-%m-%d %H:%M"),
            );
        }
        Ok(())
    }
}
