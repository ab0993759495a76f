//! ArticBase application loader
//!
//! Fetches the executable header, code image and metadata of the title
//! currently inserted on a paired console, builds a kernel process from
//! them and wires the HLE services that redirect filesystem and input
//! access back to the server.

use crate::exheader::{ExHeader, EXHEADER_WIRE_SIZE};
use crate::smdh;
use crate::system_titles::system_title_region;
use oa_core::{ArticEvents, LoaderError, Settings, StatusSink, REGION_COUNT, REGION_VALUE_AUTO_SELECT};
use oa_hle::{Am, ArchiveManager, Cfg, FsUser, Hid, ProductInfo, ServiceManager};
use oa_kernel::{
    HwRevision, Kernel, MemoryMode, New3dsHwCapabilities, New3dsMemoryMode, Process,
    ResourceLimitCategory, ResourceLimitType, Segment, PAGE_SIZE,
};
use oa_net::{Client, Request, Response};
use oa_vfs::{ArticRomFsReader, ArticSecureValueBackend, UniqueDataStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Protocol version of the provisioning (setup) flow
pub const SETUP_TOOL_VERSION: u32 = 2;

/// Wire overhead reserved per request when sizing code chunks
const REQUEST_OVERHEAD: usize = 0x100;

/// Old-3DS commit limits re-applied to legacy applications on New-3DS
const LEGACY_COMMIT_PROD: u64 = 64 * 1024 * 1024;
const LEGACY_COMMIT_DEV1: u64 = 96 * 1024 * 1024;
const LEGACY_COMMIT_DEV2: u64 = 80 * 1024 * 1024;

/// Console generation the provisioning flow targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticInitMode {
    /// Plain remote play, no provisioning
    None,
    Old3ds,
    New3ds,
}

/// Shared subsystem handles the loader operates on
pub struct SystemHandles {
    pub kernel: Arc<Kernel>,
    pub services: Arc<ServiceManager>,
    pub archives: Arc<ArchiveManager>,
    pub settings: Arc<Settings>,
    pub status: Arc<StatusSink>,
    pub unique_data: Arc<UniqueDataStore>,
}

/// Application loader backed by an Artic server
pub struct ArticLoader {
    pub(crate) client: Arc<Client>,
    pub(crate) kernel: Arc<Kernel>,
    pub(crate) services: Arc<ServiceManager>,
    pub(crate) archives: Arc<ArchiveManager>,
    pub(crate) settings: Arc<Settings>,
    pub(crate) status: Arc<StatusSink>,
    pub(crate) unique_data: Arc<UniqueDataStore>,
    pub(crate) init_mode: ArticInitMode,
    client_connected: bool,
    is_loaded: bool,
    exheader: Option<ExHeader>,
    memory_mode_override: Option<MemoryMode>,
    cached_title_id: Option<u64>,
    cached_icon: Option<Vec<u8>>,
    cached_banner: Option<Vec<u8>>,
    cached_logo: Option<Vec<u8>>,
    cached_product_info: Option<ProductInfo>,
    preferred_regions: Vec<u32>,
    main_romfs: Option<Arc<ArticRomFsReader>>,
    update_romfs: Option<Arc<ArticRomFsReader>>,
}

impl ArticLoader {
    pub fn new(address: &str, port: u16, init_mode: ArticInitMode, system: SystemHandles) -> Self {
        Self::with_client(Arc::new(Client::new(address, port)), init_mode, system)
    }

    /// Build the loader over an existing client (tests inject mocks here)
    pub fn with_client(
        client: Arc<Client>,
        init_mode: ArticInitMode,
        system: SystemHandles,
    ) -> Self {
        let status = system.status.clone();
        client.set_communication_error_callback(move |msg| status.set_disconnected(msg));

        let status = system.status.clone();
        client.set_report_traffic_callback(move |bytes| status.report_traffic(bytes));

        let status = system.status.clone();
        client.set_report_event_callback(move |event| {
            let bits = ArticEvents::from_bits_truncate(event as u32);
            let set = (event >> 32) != 0;
            status.report_event(bits, set);
        });

        Self {
            client,
            kernel: system.kernel,
            services: system.services,
            archives: system.archives,
            settings: system.settings,
            status: system.status,
            unique_data: system.unique_data,
            init_mode,
            client_connected: false,
            is_loaded: false,
            exheader: None,
            memory_mode_override: None,
            cached_title_id: None,
            cached_icon: None,
            cached_banner: None,
            cached_logo: None,
            cached_product_info: None,
            preferred_regions: Vec::new(),
            main_romfs: None,
            update_romfs: None,
        }
    }

    fn is_initial_setup(&self) -> bool {
        self.init_mode != ArticInitMode::None
    }

    pub fn is_connected(&self) -> bool {
        self.client_connected
    }

    /// Shared client handle; romfs readers and services hold clones of this
    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }

    /// Force the base memory mode instead of deriving it from the header
    pub fn set_memory_mode_override(&mut self, mode: Option<MemoryMode>) {
        self.memory_mode_override = mode;
    }

    /// Regions the title is playable in, most preferred first
    pub fn preferred_regions(&self) -> &[u32] {
        &self.preferred_regions
    }

    /// Connect once, lazily. In a provisioning session this also performs
    /// the version handshake; a mismatch tears the connection down and
    /// parks an operator-visible message in the status sink.
    pub(crate) fn ensure_connected(&mut self) -> Result<(), LoaderError> {
        if self.client_connected {
            return Ok(());
        }
        self.client_connected = self.client.connect();
        if !self.client_connected {
            return Err(LoaderError::Artic);
        }

        if self.is_initial_setup() {
            let mut req = self.client.new_request("System_ArticSetupVersion");
            req.add_param_u32(SETUP_TOOL_VERSION);

            let compatible = match self.client.send(&req) {
                Some(resp) => match resp.get_buffer(0) {
                    Some(buf) if buf.len() == 4 => {
                        u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) == SETUP_TOOL_VERSION
                    }
                    _ => false,
                },
                None => false,
            };
            if !compatible {
                self.status.set_disconnected(
                    "Incompatible Artic Setup tool version. \
                     Update the setup tool on the console and this emulator.",
                );
                self.client_connected = false;
                self.client.stop();
                return Err(LoaderError::Artic);
            }
        }
        Ok(())
    }

    fn send_checked(&self, req: &Request) -> Result<Response, LoaderError> {
        let resp = self.client.send(req).ok_or(LoaderError::Artic)?;
        if !resp.succeeded() || resp.method_result() != 0 {
            return Err(LoaderError::Artic);
        }
        Ok(resp)
    }

    fn fetch_resource(&mut self, method: &str) -> Result<Vec<u8>, LoaderError> {
        self.ensure_connected()?;
        let req = self.client.new_request(method);
        let resp = self.send_checked(&req)?;
        let buf = resp.get_buffer(0).ok_or(LoaderError::Artic)?;
        Ok(buf.to_vec())
    }

    /// Fetch and memoize the executable header of the inserted title
    pub(crate) fn load_exheader(&mut self) -> Result<ExHeader, LoaderError> {
        if let Some(header) = &self.exheader {
            return Ok(header.clone());
        }
        let bytes = self.fetch_resource("Process_GetExheader")?;
        if bytes.len() != EXHEADER_WIRE_SIZE {
            return Err(LoaderError::Artic);
        }
        let header = ExHeader::parse(&bytes).map_err(|_| LoaderError::Artic)?;
        debug!(
            "Exheader for {} ({:016X})",
            header.codeset_info.name_str(),
            header.system_local_caps.program_id
        );
        self.exheader = Some(header.clone());
        Ok(header)
    }

    /// Program ID of the inserted title
    pub fn read_program_id(&mut self) -> Result<u64, LoaderError> {
        if let Some(id) = self.cached_title_id {
            return Ok(id);
        }
        let buf = self.fetch_resource("Process_GetTitleID")?;
        if buf.len() != 8 {
            return Err(LoaderError::Artic);
        }
        let id = u64::from_le_bytes([
            buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
        ]);
        self.cached_title_id = Some(id);
        Ok(id)
    }

    /// Transfer the full code image in server-sized chunks.
    ///
    /// Every response must carry exactly the requested chunk; a mismatch
    /// aborts the transfer rather than leaving a gap in the image.
    pub fn read_code(&mut self) -> Result<Vec<u8>, LoaderError> {
        let header = self.load_exheader()?;
        let total = header.code_image_size();

        let max_chunk = self.client.max_request_size().saturating_sub(REQUEST_OVERHEAD);
        if max_chunk == 0 {
            return Err(LoaderError::Artic);
        }

        let mut code = Vec::with_capacity(total);
        while code.len() < total {
            let chunk_len = max_chunk.min(total - code.len());

            let mut req = self.client.new_request("Process_ReadCode");
            req.add_param_i32(code.len() as i32);
            req.add_param_i32(chunk_len as i32);
            let resp = self.send_checked(&req)?;

            let chunk = resp.get_buffer(0).ok_or(LoaderError::Artic)?;
            if chunk.len() != chunk_len {
                return Err(LoaderError::Artic);
            }
            code.extend_from_slice(chunk);
        }
        debug!("Code image transferred: 0x{:x} bytes", code.len());
        Ok(code)
    }

    pub fn read_icon(&mut self) -> Result<Vec<u8>, LoaderError> {
        if let Some(icon) = &self.cached_icon {
            return Ok(icon.clone());
        }
        let icon = self.fetch_resource("Process_ReadIcon")?;
        self.cached_icon = Some(icon.clone());
        Ok(icon)
    }

    pub fn read_banner(&mut self) -> Result<Vec<u8>, LoaderError> {
        if let Some(banner) = &self.cached_banner {
            return Ok(banner.clone());
        }
        let banner = self.fetch_resource("Process_ReadBanner")?;
        self.cached_banner = Some(banner.clone());
        Ok(banner)
    }

    pub fn read_logo(&mut self) -> Result<Vec<u8>, LoaderError> {
        if let Some(logo) = &self.cached_logo {
            return Ok(logo.clone());
        }
        let logo = self.fetch_resource("Process_ReadLogo")?;
        self.cached_logo = Some(logo.clone());
        Ok(logo)
    }

    /// Product info record of the inserted title
    pub fn load_product_info(&mut self) -> Result<ProductInfo, LoaderError> {
        if let Some(info) = &self.cached_product_info {
            return Ok(info.clone());
        }
        let bytes = self.fetch_resource("Process_GetProductInfo")?;
        let info = ProductInfo::from_bytes(&bytes)?;
        self.cached_product_info = Some(info.clone());
        Ok(info)
    }

    /// English short title from the icon, when the title ships one
    pub fn read_title(&mut self) -> Result<String, LoaderError> {
        let icon = self.read_icon()?;
        if !smdh::is_valid_smdh(&icon) {
            return Err(LoaderError::InvalidFormat("icon is not an SMDH".to_string()));
        }
        smdh::short_title(&icon, smdh::TitleLanguage::English)
            .ok_or_else(|| LoaderError::InvalidFormat("icon is not an SMDH".to_string()))
    }

    /// Extdata ID the title stores its extra data under
    pub fn read_extdata_id(&mut self) -> Result<u64, LoaderError> {
        let header = self.load_exheader()?;
        let storage = header.system_local_caps.storage_info;
        if !storage.uses_extended_savedata_access() {
            return Ok(storage.ext_save_data_id);
        }
        // Extended access packs up to six candidate ids; first populated
        // slot wins.
        for slot in 0..6 {
            let id = storage.extdata_id_slot(slot);
            if id != 0 {
                return Ok(id);
            }
        }
        Err(LoaderError::NotUsed)
    }

    pub fn load_core_version(&mut self) -> Result<u32, LoaderError> {
        Ok(self.load_exheader()?.system_local_caps.core_version)
    }

    /// Base (Old-3DS) memory mode, honoring an explicit override
    pub fn load_kernel_memory_mode(&mut self) -> Result<MemoryMode, LoaderError> {
        if let Some(mode) = self.memory_mode_override {
            return Ok(mode);
        }
        let system_mode = self.load_exheader()?.system_local_caps.system_mode;
        Ok(MemoryMode::from_exheader(system_mode).unwrap_or_else(|| {
            warn!("Unknown system memory mode {}, assuming Prod", system_mode);
            MemoryMode::Prod
        }))
    }

    pub fn load_new3ds_hw_capabilities(&mut self) -> Result<New3dsHwCapabilities, LoaderError> {
        let caps = self.load_exheader()?.system_local_caps;
        Ok(New3dsHwCapabilities {
            enable_l2_cache: caps.enable_l2_cache,
            enable_804mhz_cpu: caps.enable_804mhz_cpu,
            memory_mode: New3dsMemoryMode::from_exheader(caps.n3ds_mode),
        })
    }

    pub fn is_executable(&mut self) -> Result<bool, LoaderError> {
        Ok(true)
    }

    /// Main or update romfs reader over the shared client
    pub fn read_romfs(&mut self) -> Result<Arc<ArticRomFsReader>, LoaderError> {
        if let Some(reader) = &self.main_romfs {
            return Ok(reader.clone());
        }
        self.ensure_connected()?;
        let reader = Arc::new(ArticRomFsReader::open(self.client.clone(), false)?);
        self.main_romfs = Some(reader.clone());
        Ok(reader)
    }

    pub fn read_update_romfs(&mut self) -> Result<Arc<ArticRomFsReader>, LoaderError> {
        if let Some(reader) = &self.update_romfs {
            return Ok(reader.clone());
        }
        self.ensure_connected()?;
        let reader = Arc::new(ArticRomFsReader::open(self.client.clone(), true)?);
        self.update_romfs = Some(reader.clone());
        Ok(reader)
    }

    /// Release romfs readers before the shared client goes away
    pub fn detach_readers(&mut self) {
        for reader in [self.main_romfs.take(), self.update_romfs.take()]
            .into_iter()
            .flatten()
        {
            reader.clear_cache();
            reader.close();
        }
    }

    /// Build and start a process from a header and its code image.
    ///
    /// Shared by the main title and the provisioning-time NIM launch; the
    /// memory mode always comes from the main title's header.
    pub(crate) fn load_exec_impl(
        &mut self,
        program_id: u64,
        header: &ExHeader,
        code: Vec<u8>,
    ) -> Result<Arc<Process>, LoaderError> {
        let memory_mode = self.load_kernel_memory_mode()?;

        let info = &header.codeset_info;
        let mut codeset = self
            .kernel
            .create_codeset(&info.name_str(), program_id);

        codeset.code = Segment {
            offset: 0,
            addr: info.text.address,
            size: info.text.num_pages * PAGE_SIZE,
        };
        codeset.rodata = Segment {
            offset: codeset.code.offset + codeset.code.size,
            addr: info.ro.address,
            size: info.ro.num_pages * PAGE_SIZE,
        };
        let bss_page_size = (info.bss_size + 0xFFF) & !0xFFF;
        codeset.data = Segment {
            offset: codeset.rodata.offset + codeset.rodata.size,
            addr: info.data.address,
            size: info.data.num_pages * PAGE_SIZE + bss_page_size,
        };
        codeset.entrypoint = codeset.code.addr;

        let mut code = code;
        code.resize(code.len() + bss_page_size as usize, 0);
        codeset.memory = code;

        let process = self.kernel.create_process(codeset);

        let caps = &header.system_local_caps;
        let category = ResourceLimitCategory::from_exheader(caps.resource_limit_category);
        let hw_revision = if self.settings.system.is_new_3ds {
            HwRevision::New3ds
        } else {
            HwRevision::Old3ds
        };
        let limit = self
            .kernel
            .resource_limits()
            .get_for_category(category, memory_mode, hw_revision);

        // Titles unaware of New-3DS hardware must see the Old-3DS
        // application memory region even on a New-3DS.
        let n3ds_mode = New3dsMemoryMode::from_exheader(caps.n3ds_mode);
        if self.settings.system.is_new_3ds
            && n3ds_mode == New3dsMemoryMode::Legacy
            && category == ResourceLimitCategory::Application
        {
            let legacy_commit = match memory_mode {
                MemoryMode::Prod => Some(LEGACY_COMMIT_PROD),
                MemoryMode::Dev1 => Some(LEGACY_COMMIT_DEV1),
                MemoryMode::Dev2 => Some(LEGACY_COMMIT_DEV2),
                _ => None,
            };
            if let Some(commit) = legacy_commit {
                limit.set_limit_value(ResourceLimitType::Commit, commit);
            }
        }
        process.set_resource_limit(limit);
        process.set_ideal_processor(caps.ideal_processor);
        process
            .parse_kernel_caps(&header.kernel_caps)
            .map_err(|_| LoaderError::Artic)?;

        if let Some(fs_user) = self.services.get::<FsUser>("fs:USER") {
            fs_user.register_program_info(process.process_id(), program_id, "articbase://");
        }
        // Product info must be registered before the process runs.
        let product_info = self.load_product_info()?;
        if let Some(fs_user) = self.services.get::<FsUser>("fs:USER") {
            fs_user.register_product_info(process.process_id(), product_info);
        }

        process.run(caps.priority as i32, info.stack_size);
        Ok(process)
    }

    fn load_exec(&mut self) -> Result<Arc<Process>, LoaderError> {
        if !self.is_loaded {
            return Err(LoaderError::NotLoaded);
        }
        let program_id = self.read_program_id()?;
        let header = self.load_exheader()?;
        let code = self.read_code()?;
        self.load_exec_impl(program_id, &header, code)
    }

    /// Load the remote title end to end: fetch everything, optionally run
    /// the provisioning flow, start the process and register the services
    /// that keep talking to the server afterwards.
    pub fn load(&mut self) -> Result<Arc<Process>, LoaderError> {
        if self.is_loaded {
            return Err(LoaderError::AlreadyLoaded);
        }

        let program_id = self.read_program_id()?;
        info!("Loading remote title {:016X}", program_id);
        self.is_loaded = true;

        if self.is_initial_setup() {
            self.run_initial_setup()?;
        }

        let process = self.load_exec()?;
        self.archives.register_self_ncch(program_id);

        if !self.is_initial_setup() {
            self.archives.register_artic_save_data(self.client.clone());
            self.archives.register_artic_ext_data(self.client.clone());
            self.archives.register_artic_ncch(self.client.clone());
            self.archives
                .register_artic_system_save_data(self.client.clone());

            if let Some(fs_user) = self.services.get::<FsUser>("fs:USER") {
                fs_user.register_secure_value_backend(Arc::new(ArticSecureValueBackend::new(
                    self.client.clone(),
                )));
            }
            if let Some(cfg) = self.services.get::<Cfg>("cfg:u") {
                cfg.use_artic_client(self.client.clone());
            }
            for port in ["am:net", "am:app"] {
                if let Some(am) = self.services.get::<Am>(port) {
                    am.use_artic_client(self.client.clone());
                }
            }
            if self.settings.system.use_artic_base_controller {
                if let Some(hid) = self.services.get::<Hid>("hid:USER") {
                    hid.use_artic_client(self.client.clone());
                }
            }
        }

        self.parse_region_lockout_info(program_id);
        Ok(process)
    }

    /// Derive the preferred-region list when the console region is on
    /// auto-select. Regular titles carry a lockout mask in their icon;
    /// system titles encode a region in their program ID.
    fn parse_region_lockout_info(&mut self, program_id: u64) {
        if self.settings.system.region_value != REGION_VALUE_AUTO_SELECT {
            return;
        }
        self.preferred_regions.clear();

        if let Ok(icon) = self.read_icon() {
            if let Some(lockout) = smdh::region_lockout(&icon) {
                for region in 0..REGION_COUNT {
                    if lockout & (1 << region) != 0 {
                        self.preferred_regions.push(region);
                    }
                }
                return;
            }
        }
        if let Some(region) = system_title_region(program_id) {
            self.preferred_regions.push(region);
        }
    }
}

impl Drop for ArticLoader {
    fn drop(&mut self) {
        // Readers hold server-side handles on the shared client; release
        // them before the transport goes down.
        self.detach_readers();
        self.client.stop();
    }
}
