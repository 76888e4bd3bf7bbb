// GUI-subsystem binary on Windows: no console window is allocated.
// In CLI mode (--input/-i present) we attach to the launching terminal and
// reopen CONOUT$/CONIN$ so println!/eprintln! reach it.
#![windows_subsystem = "windows"]

use std::process::ExitCode;

use backdrop::app::{BackdropApp, model_from_settings};
use backdrop::cli;
use backdrop::logger;
use backdrop::session::{EditSession, SessionOptions};
use backdrop::settings::AppSettings;
use eframe::egui;

fn main() -> ExitCode {
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        attach_parent_console();
    }

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let level = if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        logger::init_with_level(level, true);
        return cli::run(args);
    }

    // -- GUI mode -----------------------------------------------------
    logger::init();

    let settings = AppSettings::load();
    let session = match EditSession::new(
        model_from_settings(&settings),
        SessionOptions::from_settings(&settings),
    ) {
        Ok(s) => s,
        Err(e) => {
            log::error!("[Session] {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_min_inner_size([800.0, 500.0])
            .with_title("Backdrop"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Backdrop",
        options,
        Box::new(move |cc| Box::new(BackdropApp::new(cc, session, settings))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("[UI] {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
        fn SetStdHandle(nStdHandle: u32, hHandle: isize) -> i32;
        fn CreateFileW(
            lpFileName: *const u16,
            dwDesiredAccess: u32,
            dwShareMode: u32,
            lpSecurityAttributes: *const std::ffi::c_void,
            dwCreationDisposition: u32,
            dwFlagsAndAttributes: u32,
            hTemplateFile: isize,
        ) -> isize;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    const GENERIC_READ: u32 = 0x8000_0000;
    const GENERIC_WRITE: u32 = 0x4000_0000;
    const FILE_SHARE_READ_WRITE: u32 = 0x0000_0003;
    const OPEN_EXISTING: u32 = 3;
    const STD_INPUT_HANDLE: u32 = 0xFFFF_FFF6_u32; // -10
    const STD_OUTPUT_HANDLE: u32 = 0xFFFF_FFF5_u32; // -11
    const STD_ERROR_HANDLE: u32 = 0xFFFF_FFF4_u32; // -12
    const INVALID_HANDLE_VALUE: isize = -1;

    let open = |name: &str, access: u32| -> isize {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            CreateFileW(
                wide.as_ptr(),
                access,
                FILE_SHARE_READ_WRITE,
                std::ptr::null(),
                OPEN_EXISTING,
                0,
                0,
            )
        }
    };

    unsafe {
        AttachConsole(ATTACH_PARENT_PROCESS);
    }
    let hout = open("CONOUT$", GENERIC_WRITE);
    if hout != INVALID_HANDLE_VALUE {
        unsafe {
            SetStdHandle(STD_OUTPUT_HANDLE, hout);
            SetStdHandle(STD_ERROR_HANDLE, hout);
        }
    }
    let hin = open("CONIN$", GENERIC_READ);
    if hin != INVALID_HANDLE_VALUE {
        unsafe {
            SetStdHandle(STD_INPUT_HANDLE, hin);
        }
    }
}
