use anyhow::{Context, Result};
use std::sync::Arc;

use drivedown::cli::{self, Command};
use drivedown::config::Config;
use drivedown::core::{DownloadCenter, DownloadEvent, EventFilter, StartOutcome};
use drivedown::library::LocalLibrary;
use drivedown::provider::{Credentials, GoogleDriveListing, GoogleDriveProvider, Provider, RemoteListing};
use drivedown::ui::{self, FolderView, LibraryView, ProgressManager};
use drivedown::utils::logger;

#[actix::main]
async fn main() -> Result<()> {
    let (args, config) = cli::Args::parse_args().context("参数解析失败")?;
    if let Err(e) = logger::init(&config) {
        eprintln!("{}", e);
    }
    log::info!("程序启动");
    log::debug!("{}", config.get_summary());

    let credentials = Credentials::resolve(&config);
    let library = LocalLibrary::from_config(&config);
    library.ensure_dirs().context("无法创建下载目录")?;

    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
    if credentials.is_authenticated() {
        providers.push(Arc::new(GoogleDriveProvider::new(&config, credentials.clone())?));
    } else {
        log::warn!("未设置访问令牌，云端浏览与下载不可用");
    }
    let center = DownloadCenter::start(library, providers);

    match args.command.clone().unwrap_or(Command::Status) {
        Command::Ls { folder_id } => list_folder(&config, credentials, folder_id.unwrap_or_default()).await,
        Command::Get { file_ids } => download_files(&center, &config, credentials, &file_ids).await,
        Command::Status => show_status(&center).await,
        Command::Rm { name } => {
            center.remove_completed(&name).with_context(|| format!("无法删除 {}", name))?;
            ui::print_success(&format!("已删除 {}", name));
            Ok(())
        }
    }
}

async fn list_folder(config: &Config, credentials: Credentials, folder_id: String) -> Result<()> {
    let listing = GoogleDriveListing::new(config, credentials)?;
    let folder = listing
        .list_folder(&folder_id)
        .await
        .with_context(|| format!("无法列出目录 {:?}", folder_id))?;
    print!("{}", FolderView(&folder));
    Ok(())
}

async fn show_status(center: &DownloadCenter) -> Result<()> {
    let in_flight = center.list_transfers().await?;
    let completed = center.list_completed()?;
    print!("{}", LibraryView { in_flight: &in_flight, completed: &completed });
    Ok(())
}

/// 下载所有指定文件，直到每个文件都收到终止事件
async fn download_files(
    center: &DownloadCenter,
    config: &Config,
    credentials: Credentials,
    file_ids: &[String],
) -> Result<()> {
    let listing = GoogleDriveListing::new(config, credentials)?;
    let progress = ProgressManager::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DownloadEvent>();

    let bars = progress.clone();
    let token = center.subscribe(EventFilter::all(), move |event| {
        bars.handle_event(event);
        if event.is_terminal() {
            let _ = tx.send(event.clone());
        }
    });

    let mut pending = 0usize;
    for file_id in file_ids {
        let entry = match listing.file_metadata(file_id).await {
            Ok(entry) => entry,
            Err(e) => {
                ui::print_error(&format!("获取文件信息失败 {}: {}", file_id, e));
                continue;
            }
        };
        if entry.is_folder() {
            ui::print_error(&format!("{} 是目录，跳过", entry.name));
            continue;
        }
        let item = entry.to_cloud_item();
        // 先建进度条再发起下载，快速完成的传输也能找到自己的进度条
        let created = progress.add(&item);
        match center.start_download(item.clone()).await {
            Ok(StartOutcome::Started) => pending += 1,
            Ok(StartOutcome::AlreadyDownloading) => log::info!("{} 已在下载中", item.name),
            Err(e) => {
                if created {
                    progress.remove(&item.id);
                }
                ui::print_error(&format!("无法下载 {}: {}", item.name, e));
            }
        }
    }

    let (mut finished, mut failed, mut canceled) = (0usize, 0usize, 0usize);
    let mut cancelling = false;
    while pending > 0 {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !cancelling => {
                cancelling = true;
                let stopped = center.stop_all().await?;
                log::info!("用户取消 {} 个下载", stopped);
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                pending -= 1;
                match event {
                    DownloadEvent::Finished { .. } => finished += 1,
                    DownloadEvent::Canceled { .. } => canceled += 1,
                    DownloadEvent::Failed { .. } => failed += 1,
                    DownloadEvent::Progress { .. } => {}
                }
            }
        }
    }
    center.unsubscribe(token);

    println!("\n下载统计: 完成 {}, 失败 {}, 取消 {}", finished, failed, canceled);
    log::info!("下载结束 - 完成: {}, 失败: {}, 取消: {}", finished, failed, canceled);
    Ok(())
}
