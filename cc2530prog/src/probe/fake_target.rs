//! A simulated CC2530 sitting on the other end of the debug lines.
//!
//! [`FakeTarget`] implements [`Gpio`] and decodes what the host clocks out
//! the way the chip would: it detects debug mode entry, collects command
//! headers and parameters, runs the handful of 8051 instructions the
//! programmer injects, moves burst data with the DMA channels described by
//! the descriptor table in its own XDATA and writes flash when `FCTL` is
//! triggered. Delays and faults can be configured to exercise the error
//! paths.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;

use super::{Direction, Gpio, GpioError, Pins, ResetPolarity};
use crate::chip::{ChipInfo0, FlashSize, CC2530_ID};
use crate::command::{self, CommandSpec, LengthEncoding, Parameters};
use crate::flashing::dma::{mode, trigger, DmaDescriptor};
use crate::flashing::{BANK_SIZE, BANK_WINDOW};
use crate::registers::{fctl, status, Register};

const XDATA_SIZE: usize = 0x1_0000;
/// `CLKCONCMD`/`CLKCONSTA` after reset: RC oscillator, slowest clocks.
const CLOCK_RESET_VALUE: u8 = 0xC9;
const DMA_CHANNELS: u8 = 5;

/// How the simulated chip identifies and behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeTargetConfig {
    pub pins: Pins,
    pub reset_polarity: ResetPolarity,
    pub chip_id: u8,
    pub revision: u8,
    pub chip_info0: u8,
    pub chip_info1: u8,
    /// Bytes at `X_EXT_ADDR0` onwards.
    pub extended_address: [u8; 8],
    /// Samples of the data line that still read high before a response.
    pub ready_delay: u32,
    /// Never signal that a response is ready.
    pub never_ready: bool,
    /// Status reads that still report the chip erase as running.
    pub erase_busy_reads: u32,
    /// `FCTL` reads that still report a flash write as running.
    pub flash_busy_reads: u32,
    /// `CLKCONSTA` reads before the oscillator switch completes.
    pub clock_settle_reads: u32,
    /// `WRITE_CONFIG` commands that echo the wrong value.
    pub config_echo_failures: u32,
    /// Flash offsets that don't keep the value written to them.
    pub corrupt_offsets: Vec<u32>,
    /// The `set_value` call with this number, counting from 1, fails.
    pub fail_set_value: Option<u32>,
    /// Exporting this line fails.
    pub fail_export: Option<u32>,
}

impl Default for FakeTargetConfig {
    fn default() -> Self {
        Self {
            pins: Pins::default(),
            reset_polarity: ResetPolarity::default(),
            chip_id: CC2530_ID,
            revision: 0x24,
            // 64 KiB, no USB.
            chip_info0: 0x20,
            chip_info1: 0x07,
            extended_address: [0x4B, 0x1D, 0x3C, 0x02, 0x00, 0x4B, 0x12, 0x00],
            ready_delay: 0,
            never_ready: false,
            erase_busy_reads: 0,
            flash_busy_reads: 0,
            clock_settle_reads: 0,
            config_echo_failures: 0,
            corrupt_offsets: Vec::new(),
            fail_set_value: None,
            fail_export: None,
        }
    }
}

impl FakeTargetConfig {
    /// Report a flash size code in `CHIPINFO0`.
    pub fn with_flash_size_code(mut self, code: u8) -> Self {
        self.chip_info0 = (self.chip_info0 & !0x70) | ((code & 0x07) << 4);
        self
    }
}

/// What the simulated chip observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeTargetStats {
    pub debug_entries: u32,
    /// Resets that did not enter debug mode.
    pub resets: u32,
    /// Commands executed, in order.
    pub commands: Vec<&'static str>,
    pub unknown_headers: u32,
    pub ignored_instructions: u32,
    /// Clock pulses received while a response was not ready.
    pub wait_clocks: u32,
    /// Samples of the data line while a response was not ready.
    pub busy_samples: u32,
    /// Response bits clocked out to the host.
    pub bits_read: u32,
    /// Flash writes started by `FCTL` with a flash DMA channel armed.
    pub flash_writes: u32,
    /// Flash writes triggered without an armed flash channel.
    pub flash_writes_without_dma: u32,
    /// Flash writes triggered while the previous one was still running.
    pub overlapping_writes: u32,
    /// Calls of `set_value`, including failed ones.
    pub set_values: u32,
}

impl FakeTargetStats {
    pub fn count(&self, command: &str) -> usize {
        self.commands.iter().filter(|&&name| name == command).count()
    }
}

/// A command whose header has arrived but not all of its parameters.
#[derive(Debug)]
struct Pending {
    header: u8,
    command: &'static CommandSpec,
    expected: usize,
    /// A burst write's second length byte is still outstanding.
    length_pending: bool,
    params: Vec<u8>,
}

#[derive(Debug)]
struct Response {
    ready: bool,
    delay: u32,
    bits: VecDeque<bool>,
    current: bool,
}

struct State {
    config: FakeTargetConfig,
    exported: BTreeSet<u32>,

    reset_level: bool,
    reset_asserted: bool,
    clock: bool,
    data_out: bool,
    host_drives_data: bool,

    entry_clocks: u32,
    debug_mode: bool,
    rx_shift: u8,
    rx_bits: u8,
    pending: Option<Pending>,
    response: Option<Response>,

    halted: bool,
    debug_config: u8,
    dptr: u16,
    acc: u8,
    xdata: Vec<u8>,
    flash: Vec<u8>,
    dma_armed: u8,
    dma_progress: [u16; DMA_CHANNELS as usize],

    erase_busy: u32,
    flash_busy: u32,
    clock_settle: u32,
    echo_failures: u32,

    stats: FakeTargetStats,
}

/// A simulated CC2530, see the [module documentation](self).
///
/// Clones share the same chip, so a test can keep one handle to inspect
/// the chip while another one drives it.
#[derive(Clone)]
pub struct FakeTarget {
    state: Rc<RefCell<State>>,
}

impl std::fmt::Debug for FakeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FakeTarget")
            .field("debug_mode", &state.debug_mode)
            .field("exported", &state.exported)
            .field("flash_len", &state.flash.len())
            .finish_non_exhaustive()
    }
}

impl Default for FakeTarget {
    fn default() -> Self {
        Self::new(FakeTargetConfig::default())
    }
}

impl FakeTarget {
    pub fn new(config: FakeTargetConfig) -> Self {
        let flash_len = FlashSize::from_code(ChipInfo0(config.chip_info0).flash_size_code())
            .map_or(BANK_SIZE, FlashSize::bytes);

        let mut xdata = vec![0; XDATA_SIZE];
        let ext_addr = usize::from(Register::ExtAddr0.address());
        xdata[ext_addr..ext_addr + config.extended_address.len()]
            .copy_from_slice(&config.extended_address);
        xdata[usize::from(Register::ClkConCmd.address())] = CLOCK_RESET_VALUE;
        xdata[usize::from(Register::ClkConSta.address())] = CLOCK_RESET_VALUE;

        let state = State {
            reset_level: config.reset_polarity.level(false),
            echo_failures: config.config_echo_failures,
            config,
            exported: BTreeSet::new(),
            reset_asserted: false,
            clock: false,
            data_out: false,
            host_drives_data: false,
            entry_clocks: 0,
            debug_mode: false,
            rx_shift: 0,
            rx_bits: 0,
            pending: None,
            response: None,
            halted: false,
            debug_config: 0,
            dptr: 0,
            acc: 0,
            xdata,
            flash: vec![0xFF; flash_len as usize],
            dma_armed: 0,
            dma_progress: [0; DMA_CHANNELS as usize],
            erase_busy: 0,
            flash_busy: 0,
            clock_settle: 0,
            stats: FakeTargetStats::default(),
        };

        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn stats(&self) -> FakeTargetStats {
        self.state.borrow().stats.clone()
    }

    pub fn flash(&self) -> Vec<u8> {
        self.state.borrow().flash.clone()
    }

    /// XDATA contents, without the side effects a read by the chip has.
    pub fn xdata(&self, address: u16) -> u8 {
        self.state.borrow().xdata[usize::from(address)]
    }

    pub fn in_debug_mode(&self) -> bool {
        self.state.borrow().debug_mode
    }

    pub fn exported_pins(&self) -> Vec<u32> {
        self.state.borrow().exported.iter().copied().collect()
    }
}

impl Gpio for FakeTarget {
    fn name(&self) -> &str {
        "fake"
    }

    fn export(&mut self, pin: u32) -> Result<(), GpioError> {
        let mut state = self.state.borrow_mut();
        if state.config.fail_export == Some(pin) {
            return Err(injected_fault(format!("exporting GPIO {pin} failed")));
        }

        state.exported.insert(pin);
        Ok(())
    }

    fn unexport(&mut self, pin: u32) -> Result<(), GpioError> {
        self.state.borrow_mut().exported.remove(&pin);
        Ok(())
    }

    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<(), GpioError> {
        let mut state = self.state.borrow_mut();
        state.check_exported(pin)?;

        let pins = state.config.pins;
        if pin == pins.data {
            let drives = direction != Direction::In;
            if drives && !state.host_drives_data {
                // A new command starts, whatever was not read is dropped.
                state.response = None;
                state.rx_bits = 0;
                state.rx_shift = 0;
            }
            state.host_drives_data = drives;
        }

        match direction {
            Direction::In => Ok(()),
            Direction::Out => state.drive(pin, false),
            Direction::High => state.drive(pin, true),
        }
    }

    fn value(&mut self, pin: u32) -> Result<bool, GpioError> {
        let mut state = self.state.borrow_mut();
        state.check_exported(pin)?;

        let pins = state.config.pins;
        Ok(if pin == pins.data {
            state.sample_data()
        } else if pin == pins.clock {
            state.clock
        } else if pin == pins.reset {
            state.reset_level
        } else {
            false
        })
    }

    fn set_value(&mut self, pin: u32, value: bool) -> Result<(), GpioError> {
        let mut state = self.state.borrow_mut();
        state.stats.set_values += 1;
        if state.config.fail_set_value == Some(state.stats.set_values) {
            return Err(injected_fault(format!("writing GPIO {pin} failed")));
        }

        state.check_exported(pin)?;
        state.drive(pin, value)
    }
}

fn injected_fault(message: String) -> GpioError {
    GpioError::Backend(message.into())
}

impl State {
    fn check_exported(&self, pin: u32) -> Result<(), GpioError> {
        if self.exported.contains(&pin) {
            Ok(())
        } else {
            Err(GpioError::NotExported(pin))
        }
    }

    fn drive(&mut self, pin: u32, level: bool) -> Result<(), GpioError> {
        let pins = self.config.pins;

        if pin == pins.reset {
            self.reset_line(level);
        } else if pin == pins.clock {
            self.clock_line(level);
        } else if pin == pins.data {
            self.data_out = level;
        }

        Ok(())
    }

    fn reset_line(&mut self, level: bool) {
        self.reset_level = level;

        let asserted = level == self.config.reset_polarity.level(true);
        if asserted == self.reset_asserted {
            return;
        }
        self.reset_asserted = asserted;

        if asserted {
            self.entry_clocks = 0;
            return;
        }

        // Two clock edges while in reset select debug mode.
        self.debug_mode = self.entry_clocks >= 2;
        if self.debug_mode {
            self.stats.debug_entries += 1;
        } else {
            self.stats.resets += 1;
        }
        self.reset_cpu();
    }

    fn reset_cpu(&mut self) {
        self.pending = None;
        self.response = None;
        self.rx_bits = 0;
        self.rx_shift = 0;
        self.halted = self.debug_mode;
        self.debug_config = 0;
        self.dptr = 0;
        self.acc = 0;
        self.dma_armed = 0;
    }

    fn clock_line(&mut self, level: bool) {
        let rising = level && !self.clock;
        self.clock = level;

        if !rising {
            return;
        }
        if self.reset_asserted {
            self.entry_clocks += 1;
            return;
        }
        if !self.debug_mode {
            return;
        }

        if self.host_drives_data {
            self.rx_shift = (self.rx_shift << 1) | u8::from(self.data_out);
            self.rx_bits += 1;
            if self.rx_bits == 8 {
                let byte = self.rx_shift;
                self.rx_bits = 0;
                self.rx_shift = 0;
                self.receive(byte);
            }
        } else if let Some(response) = &mut self.response {
            if response.ready {
                response.current = response.bits.pop_front().unwrap_or(true);
                self.stats.bits_read += 1;
            } else {
                self.stats.wait_clocks += 1;
            }
        }
    }

    fn sample_data(&mut self) -> bool {
        if self.host_drives_data {
            return self.data_out;
        }
        if !self.debug_mode {
            return true;
        }

        match &mut self.response {
            None => true,
            Some(response) if response.ready => response.current,
            Some(response) => {
                if self.config.never_ready || response.delay > 0 {
                    response.delay = response.delay.saturating_sub(1);
                    self.stats.busy_samples += 1;
                    true
                } else {
                    response.ready = true;
                    false
                }
            }
        }
    }

    fn receive(&mut self, byte: u8) {
        let Some(mut pending) = self.pending.take() else {
            self.start_command(byte);
            return;
        };

        if pending.length_pending {
            pending.expected = (usize::from(pending.header & 0x07) << 8) | usize::from(byte);
            pending.length_pending = false;
        } else {
            pending.params.push(byte);
        }

        self.advance(pending);
    }

    fn start_command(&mut self, header: u8) {
        let Some(command) = command::find_opcode(header) else {
            tracing::debug!("Fake target ignores header {:#04x}", header);
            self.stats.unknown_headers += 1;
            self.respond(vec![0]);
            return;
        };

        let (expected, length_pending) = match command.parameters {
            Parameters::Fixed(count) => (count, false),
            Parameters::Variable(LengthEncoding::Opcode) => (usize::from(header & 0x07), false),
            Parameters::Variable(LengthEncoding::OpcodeAndByte) => (0, true),
        };

        self.advance(Pending {
            header,
            command,
            expected,
            length_pending,
            params: Vec::new(),
        });
    }

    fn advance(&mut self, pending: Pending) {
        if pending.length_pending || pending.params.len() < pending.expected {
            self.pending = Some(pending);
            return;
        }

        let response = self.execute(pending.command, &pending.params);
        self.respond(response);
    }

    fn respond(&mut self, bytes: Vec<u8>) {
        let bits = bytes
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |bit| byte & (1 << bit) != 0))
            .collect();

        self.response = Some(Response {
            ready: false,
            delay: self.config.ready_delay,
            bits,
            current: false,
        });
    }

    fn status(&self) -> u8 {
        let mut value = status::OSCILLATOR_STABLE;
        if self.halted {
            value |= status::CPU_HALTED;
        }
        if self.erase_busy > 0 {
            value |= status::CHIP_ERASE_BUSY;
        }
        value
    }

    fn execute(&mut self, command: &'static CommandSpec, params: &[u8]) -> Vec<u8> {
        tracing::trace!("Fake target runs {} {:02x?}", command, params);
        self.stats.commands.push(command.name);

        match command.name {
            "erase" => {
                self.flash.fill(0xFF);
                self.erase_busy = self.config.erase_busy_reads;
                vec![self.status()]
            }
            "write_config" => {
                let value = params[0];
                if self.echo_failures > 0 {
                    self.echo_failures -= 1;
                    vec![!value]
                } else {
                    self.debug_config = value;
                    vec![value]
                }
            }
            "read_config" => vec![self.debug_config],
            "get_pc" => vec![0x00, 0x00],
            "read_status" => {
                let value = self.status();
                self.erase_busy = self.erase_busy.saturating_sub(1);
                vec![value]
            }
            "halt" => {
                self.halted = true;
                vec![self.status()]
            }
            "resume" => {
                self.halted = false;
                vec![self.status()]
            }
            "debug_inst" => {
                self.run_instruction(params);
                vec![self.acc]
            }
            "step_inst" => vec![self.acc],
            "get_bm" => vec![self.xdata[usize::from(Register::MemCtr.address())] & 0x07],
            "get_chip_id" => vec![self.config.chip_id, self.config.revision],
            "burst_write" => {
                for &byte in params {
                    self.burst_byte(byte);
                }
                vec![self.status()]
            }
            _ => {
                let mut response = vec![0; command.response_len];
                if let Some(first) = response.first_mut() {
                    *first = self.status();
                }
                response
            }
        }
    }

    fn run_instruction(&mut self, instruction: &[u8]) {
        match *instruction {
            [0x90, high, low] => self.dptr = u16::from_be_bytes([high, low]),
            [0x74, value] => self.acc = value,
            [0xF0] => self.write_xdata(self.dptr, self.acc),
            [0xE0] => self.acc = self.read_xdata(self.dptr),
            [0xA3] => self.dptr = self.dptr.wrapping_add(1),
            _ => {
                tracing::debug!("Fake target ignores instruction {:02x?}", instruction);
                self.stats.ignored_instructions += 1;
            }
        }
    }

    fn read_xdata(&mut self, address: u16) -> u8 {
        if address >= BANK_WINDOW {
            let bank = u32::from(self.register(Register::MemCtr) & 0x07);
            let offset = bank * BANK_SIZE + u32::from(address - BANK_WINDOW);
            return self.flash.get(offset as usize).copied().unwrap_or(0xFF);
        }

        match Register::from_address(address) {
            Some(Register::Fctl) => {
                let busy = self.flash_busy > 0;
                self.flash_busy = self.flash_busy.saturating_sub(1);

                let value = self.register(Register::Fctl) & !fctl::BUSY;
                if busy {
                    value | fctl::BUSY
                } else {
                    value
                }
            }
            Some(Register::ClkConSta) => {
                if self.clock_settle > 0 {
                    self.clock_settle -= 1;
                } else {
                    let selected = self.register(Register::ClkConCmd);
                    self.set_register(Register::ClkConSta, selected);
                }
                self.register(Register::ClkConSta)
            }
            Some(Register::ChipInfo0) => self.config.chip_info0,
            Some(Register::ChipInfo1) => self.config.chip_info1,
            _ => self.xdata[usize::from(address)],
        }
    }

    fn write_xdata(&mut self, address: u16, value: u8) {
        // Flash can't be written through XDATA.
        if address >= BANK_WINDOW {
            return;
        }
        self.xdata[usize::from(address)] = value;

        match Register::from_address(address) {
            Some(Register::DmaArm) => {
                for channel in 0..DMA_CHANNELS {
                    if value & (1 << channel) != 0 {
                        self.dma_armed |= 1 << channel;
                        self.dma_progress[usize::from(channel)] = 0;
                    }
                }
            }
            Some(Register::Fctl) if value & fctl::WRITE == fctl::WRITE => self.start_flash_write(),
            Some(Register::ClkConCmd) => self.clock_settle = self.config.clock_settle_reads,
            _ => {}
        }
    }

    fn register(&self, register: Register) -> u8 {
        self.xdata[usize::from(register.address())]
    }

    fn set_register(&mut self, register: Register, value: u8) {
        self.xdata[usize::from(register.address())] = value;
    }

    /// Descriptor of channel 1 to 4, read from the table `DMA1CFG` points at.
    fn descriptor(&self, channel: u8) -> DmaDescriptor {
        let table = u16::from_be_bytes([
            self.register(Register::Dma1CfgH),
            self.register(Register::Dma1CfgL),
        ]);
        let start = usize::from(table) + usize::from(channel - 1) * DmaDescriptor::SIZE;

        let mut bytes = [0; DmaDescriptor::SIZE];
        bytes.copy_from_slice(&self.xdata[start..start + DmaDescriptor::SIZE]);
        DmaDescriptor::from_bytes(bytes)
    }

    /// Armed channels among 1 to 4 with the given trigger.
    fn armed_channels(&self, trigger: u8) -> Vec<(u8, DmaDescriptor)> {
        (1..DMA_CHANNELS)
            .filter(|channel| self.dma_armed & (1 << channel) != 0)
            .map(|channel| (channel, self.descriptor(channel)))
            .filter(|(_, descriptor)| descriptor.trigger == trigger)
            .collect()
    }

    fn burst_byte(&mut self, byte: u8) {
        self.set_register(Register::DbgData, byte);

        for (channel, descriptor) in self.armed_channels(trigger::DEBUG_BURST) {
            let step = self.dma_progress[usize::from(channel)];
            let (source, destination) = transfer_addresses(&descriptor, step);

            self.xdata[usize::from(destination)] = self.xdata[usize::from(source)];

            let step = step + 1;
            self.dma_progress[usize::from(channel)] = step;
            if step >= descriptor.length {
                self.dma_armed &= !(1 << channel);
            }
        }
    }

    fn start_flash_write(&mut self) {
        if self.flash_busy > 0 {
            self.stats.overlapping_writes += 1;
        }

        let Some((channel, descriptor)) = self.armed_channels(trigger::FLASH).into_iter().next()
        else {
            self.stats.flash_writes_without_dma += 1;
            return;
        };

        let word = u16::from_be_bytes([
            self.register(Register::FaddrH),
            self.register(Register::FaddrL),
        ]);
        let start = usize::from(word) * 4;

        for step in 0..descriptor.length {
            let (source, _) = transfer_addresses(&descriptor, step);
            let value = self.xdata[usize::from(source)];
            if let Some(cell) = self.flash.get_mut(start + usize::from(step)) {
                // Programming can only clear bits.
                *cell &= value;
            }
        }

        let end = start + usize::from(descriptor.length);
        for &offset in &self.config.corrupt_offsets {
            let offset = offset as usize;
            if (start..end).contains(&offset) {
                if let Some(cell) = self.flash.get_mut(offset) {
                    *cell ^= 0x01;
                }
            }
        }

        let [high, low] = ((end / 4) as u16).to_be_bytes();
        self.set_register(Register::FaddrH, high);
        self.set_register(Register::FaddrL, low);

        self.dma_armed &= !(1 << channel);
        self.flash_busy = self.config.flash_busy_reads;
        self.stats.flash_writes += 1;
    }
}

fn transfer_addresses(descriptor: &DmaDescriptor, step: u16) -> (u16, u16) {
    let source = if descriptor.mode & mode::SOURCE_INCREMENTS != 0 {
        descriptor.source.wrapping_add(step)
    } else {
        descriptor.source
    };
    let destination = if descriptor.mode & mode::DESTINATION_INCREMENTS != 0 {
        descriptor.destination.wrapping_add(step)
    } else {
        descriptor.destination
    };

    (source, destination)
}
