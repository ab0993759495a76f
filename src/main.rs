//! oxidized-artic - remote application loader
//!
//! Boots a title straight from a paired console over an ArticBase server:
//! `oxidized-artic articbase://<host>[:port]`. The `articinio://` and
//! `articinin://` schemes additionally run the first-run console setup.

use anyhow::{bail, Context};
use oa_core::{Settings, StatusSink, SystemStatus};
use oa_hle::{Am, Apt, ArchiveManager, Cfg, FsUser, Hid, ServiceManager};
use oa_kernel::Kernel;
use oa_loader::{parse_boot_uri, ArticLoader, SystemHandles};
use oa_vfs::UniqueDataStore;
use std::sync::Arc;
use tracing::info;

fn main() -> anyhow::Result<()> {
    oa_core::logging::init();

    let uri = std::env::args()
        .nth(1)
        .context("usage: oxidized-artic <articbase|articinio|articinin>://<host>[:port]")?;
    let target = parse_boot_uri(&uri)
        .with_context(|| format!("not a valid Artic boot URI: {uri}"))?;

    let settings = Arc::new(Settings::load().map_err(|e| anyhow::anyhow!("{e}"))?);
    info!(
        "Connecting to {}:{} ({:?})",
        target.address, target.port, target.init_mode
    );

    let kernel = Arc::new(Kernel::new());
    let services = Arc::new(ServiceManager::new());
    services.register("fs:USER", Arc::new(FsUser::new()));
    services.register(
        "cfg:u",
        Arc::new(Cfg::new(
            settings.paths.config_savegame.clone(),
            settings.system.region_value,
            oa_hle::default_country_for_region(settings.system.region_value),
        )),
    );
    services.register("apt", Arc::new(Apt::new()));
    services.register("am:net", Arc::new(Am::new()));
    services.register("am:app", Arc::new(Am::new()));
    services.register("hid:USER", Arc::new(Hid::new()));

    let archives = Arc::new(ArchiveManager::new());
    let status = Arc::new(StatusSink::new());
    let unique_data = Arc::new(UniqueDataStore::new(&settings.paths.nand));

    let mut loader = ArticLoader::new(
        &target.address,
        target.port,
        target.init_mode,
        SystemHandles {
            kernel,
            services,
            archives,
            settings,
            status: status.clone(),
            unique_data,
        },
    );

    let process = match loader.load() {
        Ok(process) => process,
        Err(e) => {
            if status.status() == SystemStatus::ArticDisconnected {
                bail!("{e}: {}", status.status_message());
            }
            bail!("{e}");
        }
    };

    info!(
        "Title {:016X} running as process {}",
        process.program_id(),
        process.process_id()
    );
    Ok(())
}
