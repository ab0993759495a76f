//! End-to-end loader tests over a mock transport

use oa_core::{NetError, Settings, StatusSink, SystemStatus};
use oa_hle::{Am, Apt, ArchiveManager, Cfg, FsUser, Hid, ServiceManager};
use oa_kernel::{Kernel, ResourceLimitType};
use oa_loader::{ArticInitMode, ArticLoader, SystemHandles, SETUP_TOOL_VERSION};
use oa_net::{Client, Param, Request, Response, ResponseBuilder, Transport};
use oa_vfs::UniqueDataStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;
const TITLE_ID: u64 = 0x0004_0000_0003_1900;
const PAGE: u32 = 0x1000;

type Responder = Box<dyn Fn(&Request) -> Option<Response> + Send + Sync>;

struct MockTransport {
    max_request: usize,
    calls: Arc<Mutex<HashMap<String, u32>>>,
    responder: Responder,
}

impl Transport for MockTransport {
    fn connect(&self) -> Result<(), NetError> {
        Ok(())
    }

    fn send(&self, req: &Request) -> Result<Response, NetError> {
        *self
            .calls
            .lock()
            .entry(req.method().to_string())
            .or_insert(0) += 1;
        (self.responder)(req).ok_or_else(|| {
            NetError::ConnectionFailed(format!("no mock response for {}", req.method()))
        })
    }

    fn max_request_size(&self) -> usize {
        self.max_request
    }

    fn stop(&self) {}
}

struct TestSystem {
    loader: ArticLoader,
    calls: Arc<Mutex<HashMap<String, u32>>>,
    kernel: Arc<Kernel>,
    services: Arc<ServiceManager>,
    archives: Arc<ArchiveManager>,
    status: Arc<StatusSink>,
    unique_data: Arc<UniqueDataStore>,
    _nand: tempfile::TempDir,
}

impl TestSystem {
    fn call_count(&self, method: &str) -> u32 {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }
}

fn build_system(
    init_mode: ArticInitMode,
    mut settings: Settings,
    max_request: usize,
    responder: Responder,
) -> TestSystem {
    let nand = tempfile::tempdir().unwrap();
    settings.paths.nand = nand.path().to_path_buf();
    settings.paths.config_savegame = nand.path().join("data/sysdata/config/savegame.bin");
    let settings = Arc::new(settings);

    let kernel = Arc::new(Kernel::new());
    let services = Arc::new(ServiceManager::new());
    services.register("fs:USER", Arc::new(FsUser::new()));
    services.register(
        "cfg:u",
        Arc::new(Cfg::new(settings.paths.config_savegame.clone(), 1, 49)),
    );
    services.register("apt", Arc::new(Apt::new()));
    services.register("am:net", Arc::new(Am::new()));
    services.register("am:app", Arc::new(Am::new()));
    services.register("hid:USER", Arc::new(Hid::new()));

    let archives = Arc::new(ArchiveManager::new());
    let status = Arc::new(StatusSink::new());
    let unique_data = Arc::new(UniqueDataStore::new(nand.path()));

    let calls = Arc::new(Mutex::new(HashMap::new()));
    let transport = MockTransport {
        max_request,
        calls: calls.clone(),
        responder,
    };
    let client = Arc::new(Client::with_transport(Box::new(transport)));

    let loader = ArticLoader::with_client(
        client,
        init_mode,
        SystemHandles {
            kernel: kernel.clone(),
            services: services.clone(),
            archives: archives.clone(),
            settings,
            status: status.clone(),
            unique_data: unique_data.clone(),
        },
    );

    TestSystem {
        loader,
        calls,
        kernel,
        services,
        archives,
        status,
        unique_data,
        _nand: nand,
    }
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn exheader_bytes(
    name: &[u8],
    text_pages: u32,
    ro_pages: u32,
    data_pages: u32,
    bss_size: u32,
    system_mode: u8,
    n3ds_mode: u8,
    category: u8,
) -> Vec<u8> {
    let mut h = vec![0u8; 0x400];
    h[..name.len()].copy_from_slice(name);

    let text_addr = 0x0010_0000u32;
    let ro_addr = text_addr + text_pages * PAGE;
    let data_addr = ro_addr + ro_pages * PAGE;

    put_u32(&mut h, 0x010, text_addr);
    put_u32(&mut h, 0x014, text_pages);
    put_u32(&mut h, 0x018, text_pages * PAGE);
    put_u32(&mut h, 0x01C, 0x4000); // stack
    put_u32(&mut h, 0x020, ro_addr);
    put_u32(&mut h, 0x024, ro_pages);
    put_u32(&mut h, 0x028, ro_pages * PAGE);
    put_u32(&mut h, 0x030, data_addr);
    put_u32(&mut h, 0x034, data_pages);
    put_u32(&mut h, 0x038, data_pages * PAGE);
    put_u32(&mut h, 0x03C, bss_size);

    h[0x200..0x208].copy_from_slice(&TITLE_ID.to_le_bytes());
    put_u32(&mut h, 0x208, 2); // core version
    h[0x20D] = n3ds_mode;
    h[0x20E] = system_mode << 4;
    h[0x20F] = 0x30; // priority
    h[0x37F] = category;

    for i in 0..28 {
        put_u32(&mut h, 0x380 + i * 4, 0xFFFF_FFFF);
    }
    put_u32(&mut h, 0x380, 0x1FF0_0000);
    h
}

fn default_exheader() -> Vec<u8> {
    exheader_bytes(b"launcher", 4, 2, 1, 0x180, 0, 1, 0)
}

fn smdh_bytes(lockout: u32) -> Vec<u8> {
    let mut data = vec![0u8; 0x36C0];
    data[..4].copy_from_slice(b"SMDH");
    // English short title
    let start = 0x8 + 0x200;
    for (i, unit) in "Launcher".encode_utf16().enumerate() {
        data[start + i * 2..start + i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    data[0x2018..0x201C].copy_from_slice(&lockout.to_le_bytes());
    data
}

fn product_info_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x14];
    bytes[..10].copy_from_slice(b"CTR-P-ARTC");
    bytes[0x10..0x12].copy_from_slice(&0x3031u16.to_le_bytes());
    bytes
}

fn code_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

fn i32_params(req: &Request) -> Vec<i32> {
    req.params()
        .iter()
        .filter_map(|p| match p {
            Param::I32(v) => Some(*v),
            _ => None,
        })
        .collect()
}

fn u8_param(req: &Request) -> Option<u8> {
    req.params().iter().find_map(|p| match p {
        Param::U8(v) => Some(*v),
        _ => None,
    })
}

fn buf_ok(data: Vec<u8>) -> Response {
    ResponseBuilder::ok().buffer(data).build()
}

/// Responder for the main-title methods shared by most tests
fn standard_responder(exheader: Vec<u8>, code: Vec<u8>, icon: Vec<u8>) -> Responder {
    Box::new(move |req| match req.method() {
        "System_ArticSetupVersion" => Some(buf_ok(SETUP_TOOL_VERSION.to_le_bytes().to_vec())),
        "Process_GetTitleID" => Some(buf_ok(TITLE_ID.to_le_bytes().to_vec())),
        "Process_GetExheader" => Some(buf_ok(exheader.clone())),
        "Process_GetProductInfo" => Some(buf_ok(product_info_bytes())),
        "Process_ReadIcon" => Some(buf_ok(icon.clone())),
        "Process_ReadBanner" => Some(buf_ok(vec![0xBB; 0x400])),
        "Process_ReadLogo" => Some(buf_ok(vec![0xCC; 0x200])),
        "Process_ReadCode" => {
            let params = i32_params(req);
            let (offset, len) = (params[0] as usize, params[1] as usize);
            Some(buf_ok(code[offset..offset + len].to_vec()))
        }
        _ => None,
    })
}

#[test]
fn load_boots_remote_title() {
    let code = code_pattern(7 * PAGE as usize);
    let responder = standard_responder(default_exheader(), code.clone(), smdh_bytes(0b0000101));
    let mut sys = build_system(
        ArticInitMode::None,
        Settings::default(),
        0x100 + 0x10000,
        responder,
    );

    let process = sys.loader.load().unwrap();

    assert_eq!(process.program_id(), TITLE_ID);
    assert_eq!(process.state(), oa_kernel::ProcessState::Running);
    assert_eq!(process.priority(), Some(0x30));
    assert_eq!(process.stack_size(), Some(0x4000));

    // Contiguous segment layout with page-rounded bss appended to data
    let cs = process.codeset();
    assert_eq!(cs.code.offset, 0);
    assert_eq!(cs.code.size, 4 * PAGE);
    assert_eq!(cs.rodata.offset, 4 * PAGE);
    assert_eq!(cs.rodata.size, 2 * PAGE);
    assert_eq!(cs.data.offset, 6 * PAGE);
    assert_eq!(cs.data.size, PAGE + PAGE); // one data page + one bss page
    assert_eq!(cs.entrypoint, 0x0010_0000);
    assert_eq!(cs.memory.len(), code.len() + PAGE as usize);
    assert_eq!(&cs.memory[..code.len()], &code[..]);
    assert!(cs.memory[code.len()..].iter().all(|&b| b == 0));

    // Registrations
    let fs_user = sys.services.get::<FsUser>("fs:USER").unwrap();
    let info = fs_user.program_info(process.process_id()).unwrap();
    assert_eq!(info.program_id, TITLE_ID);
    assert_eq!(
        fs_user
            .product_info(process.process_id())
            .unwrap()
            .product_code_str(),
        "CTR-P-ARTC"
    );
    assert!(fs_user.has_secure_value_backend());
    assert_eq!(sys.archives.self_ncch_program_id(), Some(TITLE_ID));
    assert_eq!(sys.archives.artic_source_count(), 4);
    assert!(sys.services.get::<Cfg>("cfg:u").unwrap().has_artic_client());
    assert!(sys.services.get::<Am>("am:net").unwrap().has_artic_client());
    // Controller redirection is off by default
    assert!(!sys.services.get::<Hid>("hid:USER").unwrap().has_artic_client());

    // Region auto-select: lockout bits 0 and 2
    assert_eq!(sys.loader.preferred_regions(), &[0, 2]);

    // Each cached resource was fetched exactly once
    assert_eq!(sys.call_count("Process_GetTitleID"), 1);
    assert_eq!(sys.call_count("Process_GetExheader"), 1);
    assert_eq!(sys.call_count("Process_ReadIcon"), 1);
    assert_eq!(sys.status.status(), SystemStatus::Running);
}

#[test]
fn cached_resources_fetch_once() {
    let responder = standard_responder(default_exheader(), vec![], smdh_bytes(1));
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x1000, responder);

    assert_eq!(sys.loader.read_program_id().unwrap(), TITLE_ID);
    assert_eq!(sys.loader.read_program_id().unwrap(), TITLE_ID);
    assert_eq!(sys.call_count("Process_GetTitleID"), 1);

    let icon = sys.loader.read_icon().unwrap();
    assert_eq!(sys.loader.read_icon().unwrap(), icon);
    assert_eq!(sys.call_count("Process_ReadIcon"), 1);

    let banner = sys.loader.read_banner().unwrap();
    assert_eq!(sys.loader.read_banner().unwrap(), banner);
    assert_eq!(sys.call_count("Process_ReadBanner"), 1);

    assert_eq!(sys.loader.read_title().unwrap(), "Launcher");
}

#[test]
fn read_code_reassembles_chunks() {
    let code = code_pattern(7 * PAGE as usize);
    let offsets = Arc::new(Mutex::new(Vec::new()));

    let exheader = default_exheader();
    let code_served = code.clone();
    let offsets_rec = offsets.clone();
    let responder: Responder = Box::new(move |req| match req.method() {
        "Process_GetExheader" => Some(buf_ok(exheader.clone())),
        "Process_ReadCode" => {
            let params = i32_params(req);
            let (offset, len) = (params[0] as usize, params[1] as usize);
            offsets_rec.lock().push((offset, len));
            Some(buf_ok(code_served[offset..offset + len].to_vec()))
        }
        _ => None,
    });

    // 0x800-byte chunks after the per-request overhead
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x100 + 0x800, responder);

    let fetched = sys.loader.read_code().unwrap();
    assert_eq!(fetched, code);
    assert_eq!(sys.call_count("Process_ReadCode"), 14);

    // Chunks are contiguous, in order and cover the image exactly
    let mut expected_offset = 0;
    for &(offset, len) in offsets.lock().iter() {
        assert_eq!(offset, expected_offset);
        expected_offset += len;
    }
    assert_eq!(expected_offset, code.len());

    // A second transfer yields the identical image
    assert_eq!(sys.loader.read_code().unwrap(), code);
}

#[test]
fn read_code_aborts_on_short_chunk() {
    let exheader = default_exheader();
    let responder: Responder = Box::new(move |req| match req.method() {
        "Process_GetExheader" => Some(buf_ok(exheader.clone())),
        "Process_ReadCode" => {
            let len = i32_params(req)[1] as usize;
            Some(buf_ok(vec![0xAA; len - 1]))
        }
        _ => None,
    });
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x100 + 0x800, responder);

    assert_eq!(
        sys.loader.read_code(),
        Err(oa_core::LoaderError::Artic)
    );
    assert_eq!(sys.call_count("Process_ReadCode"), 1);
}

#[test]
fn version_handshake_mismatch_disconnects() {
    let responder: Responder = Box::new(|req| match req.method() {
        // Server speaks an older setup protocol
        "System_ArticSetupVersion" => Some(buf_ok(1u32.to_le_bytes().to_vec())),
        "Process_GetTitleID" => Some(buf_ok(TITLE_ID.to_le_bytes().to_vec())),
        _ => None,
    });
    let mut sys = build_system(ArticInitMode::Old3ds, Settings::default(), 0x1000, responder);

    assert!(sys.loader.load().is_err());
    assert!(!sys.loader.is_connected());
    assert_eq!(sys.status.status(), SystemStatus::ArticDisconnected);
    assert!(!sys.status.status_message().is_empty());

    // The handshake failure stops the boot before any further RPC
    assert_eq!(sys.call_count("System_ArticSetupVersion"), 1);
    assert_eq!(sys.call_count("Process_GetTitleID"), 0);
}

fn secure_info_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x111];
    bytes[0] = 0xAA; // non-blank signature
    bytes[0x100] = 1; // USA
    bytes
}

fn friend_code_seed_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x110];
    bytes[0x108..0x110].copy_from_slice(&[1; 8]);
    bytes
}

fn movable_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x140];
    bytes[..4].copy_from_slice(b"SEED");
    bytes
}

fn otp_bytes(device_id: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; 0x100];
    bytes[..4].copy_from_slice(&0x0FB0_ADDEu32.to_le_bytes());
    bytes[4..8].copy_from_slice(&device_id.to_le_bytes());
    bytes
}

fn console_id_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
    bytes.extend_from_slice(&0xCAFE_BABEu32.to_le_bytes());
    bytes
}

const MAC: [u8; 6] = [0x00, 0x1F, 0x32, 0xAB, 0xCD, 0xEF];

/// Responder covering the full provisioning flow plus the main title.
/// `movable` is injectable so tests can corrupt that transfer.
fn provisioning_responder(movable: Vec<u8>) -> Responder {
    let main = standard_responder(
        default_exheader(),
        code_pattern(7 * PAGE as usize),
        smdh_bytes(0b0000010),
    );
    let nim_exheader = {
        let mut full = exheader_bytes(b"nim", 1, 1, 1, 0, 0, 1, 1);
        full.resize(0x800, 0);
        full
    };
    let nim_code = code_pattern(3 * PAGE as usize);

    Box::new(move |req| match req.method() {
        "System_ReportDeviceID" => Some(ResponseBuilder::ok().build()),
        "System_GetSystemFile" => {
            let data = match u8_param(req).unwrap() {
                0 => secure_info_bytes(),
                1 => friend_code_seed_bytes(),
                2 => movable.clone(),
                3 => otp_bytes(0x1234_5678),
                4 => console_id_bytes(),
                5 => MAC.to_vec(),
                _ => return None,
            };
            Some(buf_ok(data))
        }
        "System_GetNIM" => Some(
            ResponseBuilder::ok()
                .buffer(nim_exheader.clone())
                .buffer(nim_code.clone())
                .build(),
        ),
        "Server_Log" => Some(ResponseBuilder::ok().build()),
        _ => main(req),
    })
}

#[test]
fn provisioning_full_flow() {
    let mut sys = build_system(
        ArticInitMode::New3ds,
        Settings::default(),
        0x100 + 0x10000,
        provisioning_responder(movable_bytes()),
    );

    let process = sys.loader.load().unwrap();

    // All six system files transferred once each
    assert_eq!(sys.call_count("System_GetSystemFile"), 6);
    assert!(sys.unique_data.secure_info_path().exists());
    assert!(sys.unique_data.friend_code_seed_path().exists());
    assert!(sys.unique_data.movable_path().exists());
    assert!(sys.unique_data.otp_path().exists());
    assert!(sys.unique_data.is_full_console_linked());

    let cfg = sys.services.get::<Cfg>("cfg:u").unwrap();
    assert_eq!(cfg.console_unique_id(), (0xCAFE_BABE, 0x1122_3344_5566_7788));
    assert_eq!(cfg.mac_address(), "00:1F:32:AB:CD:EF");
    assert!(!cfg.system_setup_needed());
    assert_eq!(sys.kernel.shared_page().mac_address(), MAC);

    // Settings applet is sent into the link flow on next launch
    let apt = sys.services.get::<Apt>("apt").unwrap();
    assert_eq!(apt.deliver_arg().unwrap().param, vec![0x7a]);

    // NIM booted before the main title: two processes were created
    assert_eq!(sys.call_count("System_GetNIM"), 1);
    assert_eq!(process.process_id(), 11);
    assert_eq!(
        sys.services.get::<Am>("am:net").unwrap().forced_revision(),
        Some(oa_kernel::HwRevision::New3ds)
    );

    // Setup sessions do not redirect archives to the server
    assert_eq!(sys.archives.artic_source_count(), 0);
    assert_eq!(sys.archives.self_ncch_program_id(), Some(TITLE_ID));
}

#[test]
fn provisioning_aborts_on_bad_transfer_size() {
    // movable.sed is neither the full nor the legacy size
    let mut sys = build_system(
        ArticInitMode::New3ds,
        Settings::default(),
        0x100 + 0x10000,
        provisioning_responder(vec![0u8; 0x130]),
    );

    assert!(sys.loader.load().is_err());

    // Transfer stops at the bad index; nothing after it is requested
    assert_eq!(sys.call_count("System_GetSystemFile"), 3);
    assert_eq!(sys.call_count("System_GetNIM"), 0);
    assert!(sys.unique_data.secure_info_path().exists());
    assert!(sys.unique_data.friend_code_seed_path().exists());
    assert!(!sys.unique_data.movable_path().exists());
    assert!(!sys.unique_data.otp_path().exists());
}

#[test]
fn provisioning_rejects_invalid_console_data() {
    // Right size, wrong magic: transfer completes but validation fails
    let mut bad_movable = movable_bytes();
    bad_movable[..4].copy_from_slice(b"XXXX");
    let mut sys = build_system(
        ArticInitMode::New3ds,
        Settings::default(),
        0x100 + 0x10000,
        provisioning_responder(bad_movable),
    );

    assert!(sys.loader.load().is_err());
    assert_eq!(sys.call_count("System_GetSystemFile"), 6);
    // The operator on the console side is told why
    assert_eq!(sys.call_count("Server_Log"), 1);
    assert_eq!(sys.call_count("System_GetNIM"), 0);
}

#[test]
fn provisioning_checks_linked_device() {
    let mut sys = build_system(
        ArticInitMode::New3ds,
        Settings::default(),
        0x100 + 0x10000,
        Box::new(|req| match req.method() {
            "System_ArticSetupVersion" => Some(buf_ok(SETUP_TOOL_VERSION.to_le_bytes().to_vec())),
            "Process_GetTitleID" => Some(buf_ok(TITLE_ID.to_le_bytes().to_vec())),
            // The paired console is a different device
            "System_ReportDeviceID" => Some(ResponseBuilder::ok().method_result(-1).build()),
            _ => None,
        }),
    );

    // Pre-link this install to another console
    for (path, data) in [
        (sys.unique_data.secure_info_path(), secure_info_bytes()),
        (sys.unique_data.friend_code_seed_path(), friend_code_seed_bytes()),
        (sys.unique_data.movable_path(), movable_bytes()),
        (sys.unique_data.otp_path(), otp_bytes(0xDEAD_0001)),
    ] {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    assert!(sys.loader.load().is_err());
    assert_eq!(sys.call_count("System_ReportDeviceID"), 1);
    assert_eq!(sys.call_count("System_GetSystemFile"), 0);
}

#[test]
fn legacy_title_commit_clamped_on_new3ds() {
    // Legacy (New-3DS-unaware) application on a New-3DS: the commit limit
    // drops to the Old-3DS value for its memory mode.
    let exheader = exheader_bytes(b"launcher", 4, 2, 1, 0, 0, 0, 0);
    let responder = standard_responder(exheader, code_pattern(7 * PAGE as usize), smdh_bytes(1));
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x100 + 0x10000, responder);

    let process = sys.loader.load().unwrap();
    let limit = process.resource_limit().unwrap();
    assert_eq!(limit.limit_value(ResourceLimitType::Commit), 64 * MIB);
}

#[test]
fn new3ds_aware_title_keeps_default_commit() {
    // Same title, but declaring a New-3DS memory mode: the limit stays at
    // the New-3DS application region size.
    let exheader = exheader_bytes(b"launcher", 4, 2, 1, 0, 0, 1, 0);
    let responder = standard_responder(exheader, code_pattern(7 * PAGE as usize), smdh_bytes(1));
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x100 + 0x10000, responder);

    let process = sys.loader.load().unwrap();
    let limit = process.resource_limit().unwrap();
    assert_eq!(limit.limit_value(ResourceLimitType::Commit), 124 * MIB);
}

#[test]
fn read_extdata_id_plain_field() {
    let mut exheader = default_exheader();
    exheader[0x230..0x238].copy_from_slice(&0x1234u64.to_le_bytes());
    let responder = standard_responder(exheader, vec![], smdh_bytes(1));
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x1000, responder);

    assert_eq!(sys.loader.read_extdata_id().unwrap(), 0x1234);
}

#[test]
fn romfs_reader_streams_and_caches_blocks() {
    use oa_vfs::RomFsReader;

    let romfs = code_pattern(0x18000); // one full 0x10000 block plus a tail
    let served = romfs.clone();
    let responder: Responder = Box::new(move |req| match req.method() {
        "Process_OpenRomFS" => Some(buf_ok((served.len() as u64).to_le_bytes().to_vec())),
        "Process_ReadRomFS" => {
            let mut u32s = req.params().iter().filter_map(|p| match p {
                Param::U32(v) => Some(*v as usize),
                _ => None,
            });
            let (offset, len) = (u32s.next().unwrap(), u32s.next().unwrap());
            Some(buf_ok(served[offset..offset + len].to_vec()))
        }
        "Process_CloseRomFS" => Some(ResponseBuilder::ok().build()),
        _ => None,
    });
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x20000, responder);

    let reader = sys.loader.read_romfs().unwrap();
    assert_eq!(reader.data_size(), 0x18000);

    // Read spanning the block boundary
    let mut out = vec![0u8; 0x200];
    assert_eq!(reader.read(0xFF80, &mut out).unwrap(), 0x200);
    assert_eq!(&out[..], &romfs[0xFF80..0x10180]);
    assert_eq!(sys.call_count("Process_ReadRomFS"), 2);

    // Both blocks are cached now; a tail read is clamped and free
    assert_eq!(reader.read(0x17FC0, &mut out).unwrap(), 0x40);
    assert_eq!(&out[..0x40], &romfs[0x17FC0..]);
    assert_eq!(sys.call_count("Process_ReadRomFS"), 2);

    // Same handle on repeat open
    assert_eq!(sys.call_count("Process_OpenRomFS"), 1);
    sys.loader.read_romfs().unwrap();
    assert_eq!(sys.call_count("Process_OpenRomFS"), 1);

    drop(reader);
    sys.loader.detach_readers();
    assert_eq!(sys.call_count("Process_CloseRomFS"), 1);
}

#[test]
fn load_twice_is_an_error() {
    let responder = standard_responder(
        default_exheader(),
        code_pattern(7 * PAGE as usize),
        smdh_bytes(1),
    );
    let mut sys = build_system(ArticInitMode::None, Settings::default(), 0x100 + 0x10000, responder);

    sys.loader.load().unwrap();
    assert!(matches!(
        sys.loader.load(),
        Err(oa_core::LoaderError::AlreadyLoaded)
    ));
}
