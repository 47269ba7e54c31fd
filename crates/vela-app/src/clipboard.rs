use vela_core::{Clipboard, MemoryClipboard};

/// OS clipboard when one is reachable, otherwise an in-process one.
pub enum HostClipboard {
    System(arboard::Clipboard),
    Memory(MemoryClipboard),
}

impl HostClipboard {
    pub fn new() -> Self {
        match arboard::Clipboard::new() {
            Ok(cb) => HostClipboard::System(cb),
            Err(e) => {
                log::warn!("system clipboard unavailable ({}), using in-process clipboard", e);
                HostClipboard::Memory(MemoryClipboard::default())
            }
        }
    }
}

impl Clipboard for HostClipboard {
    fn get_text(&mut self) -> Option<String> {
        match self {
            HostClipboard::System(cb) => cb.get_text().ok().filter(|t| !t.is_empty()),
            HostClipboard::Memory(cb) => cb.get_text(),
        }
    }

    fn set_text(&mut self, text: &str) {
        match self {
            HostClipboard::System(cb) => {
                if let Err(e) = cb.set_text(text) {
                    log::debug!("clipboard write failed: {}", e);
                }
            }
            HostClipboard::Memory(cb) => cb.set_text(text),
        }
    }
}
