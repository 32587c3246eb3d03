use super::{PlatformAdapter, ProcessTable};
use crate::error::PlatformError;
use crate::matcher;
use crate::models::{ProcessEntry, TargetProgram};
use log::{debug, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::xproto::{
    AtomEnum, ClientMessageEvent, ConnectionExt, EventMask, Keycode, Keysym, Window,
    KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
};
use x11rb::protocol::xtest::{self, ConnectionExt as XTestExt};
use x11rb::rust_connection::RustConnection;
use x11rb::CURRENT_TIME;

const XK_CONTROL_L: Keysym = 0xffe3;
const XK_S: Keysym = 0x0073;

/// `_NET_ACTIVE_WINDOW` source indication for pagers and similar tools
const SOURCE_PAGER: u32 = 2;

fn query_err(e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Query(e.to_string())
}

fn injection_err(e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Injection(e.to_string())
}

pub struct LinuxPlatform {
    conn: Option<RustConnection>,
    root: Window,
    processes: ProcessTable,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxPlatform {
    pub fn new() -> Self {
        let processes = ProcessTable::new();
        match x11rb::connect(None) {
            Ok((conn, screen_num)) => {
                let Some(root) = conn.setup().roots.get(screen_num).map(|screen| screen.root) else {
                    warn!(
                        "Invalid screen number {screen_num} ({} screens available). Focus tracking disabled.",
                        conn.setup().roots.len()
                    );
                    return Self { conn: None, root: 0, processes };
                };
                Self {
                    conn: Some(conn),
                    root,
                    processes,
                }
            }
            Err(e) => {
                // Wayland and headless sessions still get process monitoring
                warn!("Failed to connect to X server: {e}. Focus tracking disabled.");
                Self { conn: None, root: 0, processes }
            }
        }
    }

    fn connection(&self) -> Result<&RustConnection, PlatformError> {
        self.conn
            .as_ref()
            .ok_or_else(|| PlatformError::Unavailable("no X11 display connection".into()))
    }

    fn get_atom(&self, name: &str) -> Result<u32, PlatformError> {
        let conn = self.connection()?;
        conn.intern_atom(false, name.as_bytes())
            .map_err(query_err)?
            .reply()
            .map(|r| r.atom)
            .map_err(query_err)
    }

    fn get_cardinals(
        &self,
        window: Window,
        atom: u32,
        kind: AtomEnum,
        max_len: u32,
    ) -> Result<Vec<u32>, PlatformError> {
        let conn = self.connection()?;
        let reply = conn
            .get_property(false, window, atom, kind, 0, max_len)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;

        Ok(reply
            .value32()
            .map(|values| values.collect::<Vec<u32>>())
            .unwrap_or_default())
    }

    fn get_active_window_id(&self) -> Result<Option<Window>, PlatformError> {
        let atom = self.get_atom("_NET_ACTIVE_WINDOW")?;
        let windows = self.get_cardinals(self.root, atom, AtomEnum::WINDOW, 1)?;
        Ok(windows.first().copied().filter(|&w| w != 0))
    }

    fn get_window_pid(&self, window: Window) -> Result<Option<u32>, PlatformError> {
        let atom = self.get_atom("_NET_WM_PID")?;
        let values = self.get_cardinals(window, atom, AtomEnum::CARDINAL, 1)?;
        Ok(values.first().copied())
    }

    fn get_window_class(&self, window: Window) -> Result<Option<String>, PlatformError> {
        let conn = self.connection()?;
        let reply = conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::ANY, 0, 1024)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;

        if reply.value.is_empty() {
            return Ok(None);
        }

        Ok(String::from_utf8(reply.value)
            .ok()
            .and_then(|s| s.split('\0').next().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }

    fn process_name_for_window(&self, window: Window) -> Result<Option<String>, PlatformError> {
        if let Some(pid) = self.get_window_pid(window)? {
            if let Some(name) = self.processes.name_of(pid) {
                return Ok(Some(name));
            }
        }
        // Windows without _NET_WM_PID still carry a class name
        self.get_window_class(window)
    }

    fn find_window_for(&self, program: &TargetProgram) -> Result<Option<Window>, PlatformError> {
        let atom = self.get_atom("_NET_CLIENT_LIST")?;
        let clients = self.get_cardinals(self.root, atom, AtomEnum::WINDOW, 4096)?;

        for window in clients {
            match self.process_name_for_window(window) {
                Ok(Some(name)) if matcher::matches(program.as_str(), &name) => {
                    return Ok(Some(window));
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping window {window}: {e}"),
            }
        }

        Ok(None)
    }

    fn keycode_for(&self, keysym: Keysym) -> Result<Keycode, PlatformError> {
        let conn = self.connection()?;
        let setup = conn.setup();
        let min = setup.min_keycode;
        let count = setup.max_keycode.saturating_sub(min).saturating_add(1);

        let mapping = conn
            .get_keyboard_mapping(min, count)
            .map_err(injection_err)?
            .reply()
            .map_err(injection_err)?;

        let per_keycode = usize::from(mapping.keysyms_per_keycode.max(1));
        let offset = mapping
            .keysyms
            .chunks(per_keycode)
            .position(|syms| syms.contains(&keysym))
            .ok_or_else(|| PlatformError::Injection(format!("no keycode for keysym {keysym:#x}")))?;

        u8::try_from(offset)
            .ok()
            .and_then(|offset| min.checked_add(offset))
            .ok_or_else(|| PlatformError::Injection(format!("keycode out of range for {keysym:#x}")))
    }

    fn fake_key(&self, event_type: u8, keycode: Keycode) -> Result<(), PlatformError> {
        let conn = self.connection()?;
        conn.xtest_fake_input(event_type, keycode, CURRENT_TIME, self.root, 0, 0, 0)
            .map_err(injection_err)?;
        Ok(())
    }
}

impl PlatformAdapter for LinuxPlatform {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, PlatformError> {
        self.processes.list()
    }

    fn focused_process_name(&self) -> Result<Option<String>, PlatformError> {
        match self.get_active_window_id()? {
            Some(window) => self.process_name_for_window(window),
            None => Ok(None),
        }
    }

    fn activate_window(&self, program: &TargetProgram) -> Result<(), PlatformError> {
        let window = self
            .find_window_for(program)?
            .ok_or_else(|| PlatformError::WindowNotFound {
                program: program.to_string(),
            })?;

        let conn = self.connection()?;
        let atom = self.get_atom("_NET_ACTIVE_WINDOW")?;
        let event = ClientMessageEvent::new(32, window, atom, [SOURCE_PAGER, CURRENT_TIME, 0, 0, 0]);

        conn.send_event(
            false,
            self.root,
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )
        .map_err(query_err)?;
        conn.flush().map_err(query_err)?;

        debug!("Requested activation of window {window} for {program}");
        Ok(())
    }

    fn inject_save_shortcut(&self) -> Result<(), PlatformError> {
        let conn = self.connection()?;
        if conn
            .extension_information(xtest::X11_EXTENSION_NAME)
            .map_err(injection_err)?
            .is_none()
        {
            return Err(PlatformError::Injection("XTEST extension not available".into()));
        }

        let ctrl = self.keycode_for(XK_CONTROL_L)?;
        let s = self.keycode_for(XK_S)?;

        self.fake_key(KEY_PRESS_EVENT, ctrl)?;
        self.fake_key(KEY_PRESS_EVENT, s)?;
        self.fake_key(KEY_RELEASE_EVENT, s)?;
        self.fake_key(KEY_RELEASE_EVENT, ctrl)?;

        conn.flush().map_err(injection_err)?;
        Ok(())
    }
}
