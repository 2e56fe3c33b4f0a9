//! Virtual Boy system emulation.
//!
//! The pieces fit together the same way the hardware does: the V810 CPU
//! owns the bus, the bus owns the peripherals (VIP video, VSU audio,
//! timer, game pad), the interrupt lines and the event scheduler.
//! [`VbSystem`] wraps the CPU and drives whole frames, producing one
//! rendered [`Frame`](emu_core::types::Frame) and one frame's worth of
//! audio per call.
//!
//! Timing model: the CPU's signed cycle counter is rebased to zero at
//! every frame boundary. Peripherals are serviced lazily through the
//! scheduler; the VSU runs on a quarter-rate clock with a carried
//! remainder (`vsu_cycle_fix`) so no audio cycle is ever lost to the
//! divide.

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod input;
pub mod irq;
pub mod scheduler;
pub mod timer;
pub mod vip;
pub mod vsu;

use bus::VbBus;
use cartridge::Cartridge;
use cpu::{CpuState, V810};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::Frame;
use emu_core::{MountPointInfo, System};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use vip::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

pub use cartridge::CartHeader;

const STATE_SYSTEM: &str = "vb";
const STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum VbError {
    #[error("bad ROM size {size}: must be a power of two between 256 bytes and 16 MiB")]
    BadRomSize { size: usize },
    #[error("no cartridge mounted")]
    NoCartridge,
    #[error("unknown mount point: {id}")]
    InvalidMountPoint { id: String },
}

/// A periodic memory patch, applied once per frame before the CPU runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheatPatch {
    pub addr: u32,
    pub value: u8,
}

/// MAIN save-state section: bus-level state with no other home.
#[derive(Serialize, Deserialize)]
struct MainState {
    wram: Vec<u8>,
    gpram: Option<Vec<u8>>,
    wcr: u8,
    irq: u8,
    vsu_cycle_fix: i32,
}

/// The Virtual Boy.
#[derive(Debug)]
pub struct VbSystem {
    cpu: V810,
    /// Button snapshot latched at the top of each frame
    buttons: u16,
    cheats: Vec<CheatPatch>,
    /// Drained VSU output, left and right
    audio: [Vec<i16>; 2],
    /// Lifetime master-clock cycles across all frames
    total_cycles: u64,
}

impl VbSystem {
    pub fn new() -> Self {
        Self {
            cpu: V810::new(VbBus::new()),
            buttons: 0,
            cheats: Vec::new(),
            audio: [Vec::new(), Vec::new()],
            total_cycles: 0,
        }
    }

    /// Current frame's button bits (latched at the next `step_frame`).
    pub fn set_controller(&mut self, buttons: u16) {
        self.buttons = buttons;
    }

    /// Make game pad hardware reads latch immediately (latency hack).
    pub fn set_instant_read(&mut self, on: bool) {
        self.cpu.bus.pad.set_instant_read(on);
    }

    pub fn set_low_battery(&mut self, on: bool) {
        self.cpu.bus.pad.set_low_battery(on);
    }

    /// Anaglyph output colors for the left and right eye (0xRRGGBB).
    pub fn set_anaglyph_colors(&mut self, left: u32, right: u32) {
        self.cpu.bus.vip.set_anaglyph_colors(left, right);
    }

    pub fn add_cheat(&mut self, patch: CheatPatch) {
        self.cheats.push(patch);
    }

    pub fn clear_cheats(&mut self) {
        self.cheats.clear();
    }

    /// Stop the CPU run loop at the next instruction boundary. The frame
    /// in progress is abandoned, not produced.
    pub fn request_exit(&mut self) {
        self.cpu.bus.request_exit();
    }

    /// Header of the mounted game pak, if any.
    pub fn cart_header(&self) -> Option<&CartHeader> {
        self.cpu.bus.cartridge().map(|c| c.header())
    }

    /// Take this frame's audio (one `i16` sample per VSU clock, left and
    /// right channels).
    pub fn take_audio(&mut self) -> [Vec<i16>; 2] {
        std::mem::take(&mut self.audio)
    }

    /// Master-clock cycles executed since power-on.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn run_one_frame(&mut self) -> Result<Frame, VbError> {
        if self.cpu.bus.cartridge().is_none() {
            return Err(VbError::NoCartridge);
        }

        for patch in &self.cheats {
            self.cpu.bus.poke8(patch.addr, patch.value);
        }
        self.cpu.bus.pad.set_frame_buttons(self.buttons);
        self.cpu.bus.vip.start_frame();

        let ts = self.cpu.run_frame();

        // Post-run service pass: bring every peripheral to the stop
        // timestamp before any rebase arithmetic.
        self.cpu.bus.scheduler.clamp_distant();
        self.cpu.bus.force_update_all(ts);

        // Close the audio frame and carry the sub-VSU-clock remainder so
        // cumulative samples track cumulative cycles exactly.
        let fix = self.cpu.bus.vsu_cycle_fix;
        self.cpu.bus.vsu.end_frame((ts + fix) >> 2);
        self.cpu.bus.vsu.read_samples(0, &mut self.audio[0]);
        self.cpu.bus.vsu.read_samples(1, &mut self.audio[1]);
        self.cpu.bus.vsu_cycle_fix = (ts + fix) & 3;

        // Rebase all clocks to zero for the next frame.
        self.cpu.bus.timer.reset_ts();
        self.cpu.bus.pad.reset_ts(ts);
        self.cpu.bus.vip.reset_ts(ts);
        self.cpu.bus.scheduler.rebase(ts);
        self.cpu.timestamp = 0;
        self.total_cycles += ts as u64;

        let mut frame = Frame::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32);
        frame.pixels.copy_from_slice(self.cpu.bus.vip.pixels());
        Ok(frame)
    }

    /// Serialize the full machine state. `data_only` omits the identity
    /// header, for rewind-style snapshot streams.
    pub fn save_state_ex(&self, data_only: bool) -> Value {
        let bus = &self.cpu.bus;
        let main = MainState {
            wram: bus.wram.clone(),
            gpram: bus.gpram.clone(),
            wcr: bus.wcr,
            irq: bus.irq.asserted_bits(),
            vsu_cycle_fix: bus.vsu_cycle_fix,
        };

        let mut state = json!({
            "main": serde_json::to_value(&main).unwrap_or(Value::Null),
            "cpu": serde_json::to_value(self.cpu.save_state()).unwrap_or(Value::Null),
            "vsu": serde_json::to_value(&bus.vsu).unwrap_or(Value::Null),
            "timer": serde_json::to_value(&bus.timer).unwrap_or(Value::Null),
            "input": serde_json::to_value(&bus.pad).unwrap_or(Value::Null),
            "vip": serde_json::to_value(&bus.vip).unwrap_or(Value::Null),
        });
        if !data_only {
            state["system"] = json!(STATE_SYSTEM);
            state["version"] = json!(STATE_VERSION);
        }
        state
    }

    /// Restore machine state from [`save_state_ex`] output.
    ///
    /// Restoration is best-effort: every section is applied independently
    /// and the result is an error if any section was missing or malformed,
    /// with the valid sections still applied. An identity header, when
    /// present, is validated before anything is touched.
    ///
    /// [`save_state_ex`]: VbSystem::save_state_ex
    pub fn load_state_ex(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        if let Some(system) = v.get("system") {
            if system != STATE_SYSTEM {
                return Err(serde_json::Error::custom(format!(
                    "save state is for system {}, not {}",
                    system, STATE_SYSTEM
                )));
            }
            match v.get("version").and_then(Value::as_u64) {
                Some(ver) if ver as u32 == STATE_VERSION => {}
                other => {
                    return Err(serde_json::Error::custom(format!(
                        "unsupported save state version {:?}",
                        other
                    )));
                }
            }
        }

        let mut all_ok = true;

        match v.get("main").map(MainState::deserialize) {
            Some(Ok(main)) if main.wram.len() == bus::WRAM_SIZE => {
                let bus = &mut self.cpu.bus;
                bus.wram = main.wram;
                if let (Some(gpram), Some(saved)) = (bus.gpram.as_mut(), main.gpram) {
                    if saved.len() == gpram.len() {
                        *gpram = saved;
                    }
                }
                bus.wcr = main.wcr & 3;
                bus.irq.restore(main.irq);
                bus.vsu_cycle_fix = main.vsu_cycle_fix;
            }
            _ => all_ok = false,
        }

        match v.get("cpu").map(CpuState::deserialize) {
            Some(Ok(cpu)) => self.cpu.load_state(&cpu),
            _ => all_ok = false,
        }
        match v.get("vsu").map(vsu::Vsu::deserialize) {
            Some(Ok(vsu)) => self.cpu.bus.vsu = vsu,
            _ => all_ok = false,
        }
        match v.get("timer").map(timer::VbTimer::deserialize) {
            Some(Ok(timer)) => self.cpu.bus.timer = timer,
            _ => all_ok = false,
        }
        match v.get("input").map(input::GamePad::deserialize) {
            Some(Ok(pad)) => self.cpu.bus.pad = pad,
            _ => all_ok = false,
        }
        match v.get("vip").map(vip::Vip::deserialize) {
            Some(Ok(vip)) => self.cpu.bus.vip = vip,
            _ => all_ok = false,
        }

        // Pending event timestamps are never persisted; rebuild them by
        // servicing everything at the restored cycle counter.
        let ts = self.cpu.timestamp;
        self.cpu.bus.force_update_all(ts);
        self.cpu.bus.take_exit();

        if all_ok {
            Ok(())
        } else {
            Err(serde_json::Error::custom("save state incomplete"))
        }
    }
}

impl Default for VbSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for VbSystem {
    type Error = VbError;

    fn reset(&mut self) {
        self.cpu.bus.power();
        self.cpu.reset();
        self.audio = [Vec::new(), Vec::new()];
        self.total_cycles = 0;
        log(LogCategory::Bus, LogLevel::Info, || "power-on reset".to_string());
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        self.run_one_frame()
    }

    fn save_state(&self) -> Value {
        self.save_state_ex(false)
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        self.load_state_ex(v)
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: "Cartridge".to_string(),
            name: "Game Pak".to_string(),
            extensions: vec!["vb".to_string(), "vboy".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != "Cartridge" {
            return Err(VbError::InvalidMountPoint {
                id: mount_point_id.to_string(),
            });
        }
        let cart = Cartridge::load(data)?;
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("mounted game pak \"{}\"", cart.header().title)
        });
        self.cpu.bus.set_cartridge(Some(cart));
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != "Cartridge" {
            return Err(VbError::InvalidMountPoint {
                id: mount_point_id.to_string(),
            });
        }
        self.cpu.bus.set_cartridge(None);
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == "Cartridge" && self.cpu.bus.cartridge().is_some()
    }
}
