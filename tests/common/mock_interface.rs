//! Mock interface implementation simulating an AD7124 for driver tests

use ad7124::{Profile, RegisterInterface, SerialReset};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

const STATUS: u8 = 0x00;
const ADC_CONTROL: u8 = 0x01;
const DATA: u8 = 0x02;
const CHANNEL_BASE: u8 = 0x09;
const CONFIG_BASE: u8 = 0x19;
const FILTER_BASE: u8 = 0x21;
const OFFSET_BASE: u8 = 0x29;
const GAIN_BASE: u8 = 0x31;

const RDY: u8 = 0x80;
const POR_FLAG: u8 = 0x10;
const CHANNEL_ENABLE: u32 = 0x8000;

/// Records operations performed on the mock interface
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Register read
    Read {
        /// Register address
        address: u8,
        /// Number of bytes transferred
        len: usize,
    },
    /// Register write
    Write {
        /// Register address
        address: u8,
        /// Value written (big-endian bytes combined)
        value: u32,
    },
    /// Serial interface reset
    Reset,
}

/// Mode the simulated converter was put in, with the channels enabled at the time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    /// MODE field value
    pub mode: u32,
    /// Enabled channel mask when the mode was written
    pub enabled: u16,
}

/// Shared state for mock interface (uses interior mutability)
#[derive(Debug)]
struct MockState {
    /// Simulated register values by address
    registers: [u32; 57],

    /// STATUS register as the device would report it
    status: u8,

    /// Current MODE field of the simulated converter
    mode: u32,

    /// Operations log for verification
    operations: Vec<Operation>,

    /// Every MODE written to `ADC_CONTROL`
    mode_changes: Vec<ModeChange>,

    /// Failure injection flags
    fail_next_read: bool,
    fail_next_write: bool,
    /// Address -> remaining writes to that address before one fails
    fail_write_to: HashMap<u8, usize>,

    /// Conversions (single or calibration) that will not complete
    stalled_conversions: usize,

    /// Data returned for each channel in single conversion mode
    channel_data: [u32; 16],

    /// Scripted (status channel, data) pairs for continuous mode
    continuous_script: VecDeque<(u8, u32)>,

    /// Reset pulses received
    resets: usize,

    /// Keep reporting the power-on reset flag
    stuck_in_reset: bool,
}

impl MockState {
    fn new() -> Self {
        let map = Profile::PowerOn.register_map();
        let mut registers = [0u32; 57];
        for (slot, register) in registers.iter_mut().zip(map.iter()) {
            *slot = register.value;
        }

        Self {
            registers,
            status: RDY,
            mode: 0,
            operations: Vec::new(),
            mode_changes: Vec::new(),
            fail_next_read: false,
            fail_next_write: false,
            fail_write_to: HashMap::new(),
            stalled_conversions: 0,
            channel_data: [0; 16],
            continuous_script: VecDeque::new(),
            resets: 0,
            stuck_in_reset: false,
        }
    }

    /// Device-side effect of a reset; logs and injected failures survive it
    fn power_on(&mut self) {
        let fresh = Self::new();
        self.registers = fresh.registers;
        self.mode = fresh.mode;
        self.stalled_conversions = fresh.stalled_conversions;
        self.continuous_script.clear();
        self.status = RDY | POR_FLAG;
    }

    fn enabled_mask(&self) -> u16 {
        let mut mask = 0u16;
        for ch in 0..16u8 {
            if self.registers[usize::from(CHANNEL_BASE + ch)] & CHANNEL_ENABLE != 0 {
                mask |= 1 << ch;
            }
        }
        mask
    }

    fn setup_of(&self, ch: u8) -> u8 {
        ((self.registers[usize::from(CHANNEL_BASE + ch)] >> 12) & 0x7) as u8
    }

    /// Finish a conversion of `ch`: data available, status names the channel
    fn complete(&mut self, ch: u8, data: u32) {
        self.registers[usize::from(DATA)] = data & 0xFF_FFFF;
        self.status = ch & 0x0F;
    }

    fn control_written(&mut self, value: u32) {
        let mode = (value >> 2) & 0xF;
        self.mode = mode;
        self.mode_changes.push(ModeChange {
            mode,
            enabled: self.enabled_mask(),
        });

        // Writing ADC_CONTROL restarts the converter
        self.status = RDY;

        let lowest_enabled = {
            let mask = self.enabled_mask();
            (mask != 0).then(|| mask.trailing_zeros() as u8)
        };

        match mode {
            // Single conversion of the lowest enabled channel
            1 => {
                if self.stalled_conversions > 0 {
                    self.stalled_conversions -= 1;
                } else if let Some(ch) = lowest_enabled {
                    let data = self.channel_data[usize::from(ch)];
                    self.complete(ch, data);
                }
            }
            // Calibration of the enabled channel's setup
            5..=8 => {
                if self.stalled_conversions > 0 {
                    self.stalled_conversions -= 1;
                } else if let Some(ch) = lowest_enabled {
                    let setup = self.setup_of(ch);
                    match mode {
                        5 | 7 => {
                            self.registers[usize::from(OFFSET_BASE + setup)] =
                                0x80_0100 + u32::from(ch);
                        }
                        _ => {
                            self.registers[usize::from(GAIN_BASE + setup)] =
                                0x55_0000 + u32::from(ch);
                        }
                    }
                    // Calibration complete: device returns to idle
                    self.status = ch & 0x0F;
                    self.mode = 4;
                }
            }
            _ => {}
        }
    }

    fn status_read(&mut self) -> u8 {
        if self.mode == 0 {
            match self.continuous_script.pop_front() {
                Some((ch, data)) => self.complete(ch, data),
                None => self.status = RDY,
            }
        }

        let value = self.status;
        // POR flag clears once read
        if !self.stuck_in_reset {
            self.status &= !POR_FLAG;
        }
        value
    }
}

/// Mock interface for testing
#[derive(Clone)]
pub struct MockInterface {
    state: Rc<RefCell<MockState>>,
}

impl MockInterface {
    /// Create a new mock interface with power-on register values
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState::new())),
        }
    }

    /// Get a simulated register value
    pub fn register(&self, address: u8) -> u32 {
        self.state.borrow().registers[usize::from(address)]
    }

    /// Set a simulated register value
    #[allow(dead_code)]
    pub fn set_register(&self, address: u8, value: u32) {
        self.state.borrow_mut().registers[usize::from(address)] = value;
    }

    /// Channels enabled on the simulated device
    pub fn enabled_mask(&self) -> u16 {
        self.state.borrow().enabled_mask()
    }

    /// Filter registers on the simulated device
    pub fn filters(&self) -> [u32; 8] {
        let state = self.state.borrow();
        let mut filters = [0; 8];
        for (i, filter) in filters.iter_mut().enumerate() {
            *filter = state.registers[usize::from(FILTER_BASE) + i];
        }
        filters
    }

    /// Config register of a setup on the simulated device
    #[allow(dead_code)]
    pub fn setup_config(&self, setup: u8) -> u32 {
        self.register(CONFIG_BASE + setup)
    }

    /// Offset register of a setup on the simulated device
    #[allow(dead_code)]
    pub fn offset(&self, setup: u8) -> u32 {
        self.register(OFFSET_BASE + setup)
    }

    /// Gain register of a setup on the simulated device
    #[allow(dead_code)]
    pub fn gain(&self, setup: u8) -> u32 {
        self.register(GAIN_BASE + setup)
    }

    /// Set the value a single conversion of `channel` returns
    pub fn set_channel_data(&self, channel: u8, data: u32) {
        self.state.borrow_mut().channel_data[usize::from(channel)] = data;
    }

    /// Queue a continuous mode conversion reported on `channel`
    pub fn push_continuous(&self, channel: u8, data: u32) {
        self.state
            .borrow_mut()
            .continuous_script
            .push_back((channel, data));
    }

    /// Make the next `count` single conversions or calibrations never complete
    pub fn stall_conversions(&self, count: usize) {
        self.state.borrow_mut().stalled_conversions = count;
    }

    /// Force the STATUS value reported until the next mode change
    #[allow(dead_code)]
    pub fn set_status(&self, status: u8) {
        self.state.borrow_mut().status = status;
    }

    /// Never clear the power-on reset flag
    #[allow(dead_code)]
    pub fn hold_in_reset(&self) {
        self.state.borrow_mut().stuck_in_reset = true;
    }

    /// Inject a read failure on the next read operation
    #[allow(dead_code)]
    pub fn fail_next_read(&self) {
        self.state.borrow_mut().fail_next_read = true;
    }

    /// Inject a write failure on the next write operation
    #[allow(dead_code)]
    pub fn fail_next_write(&self) {
        self.state.borrow_mut().fail_next_write = true;
    }

    /// Fail the `occurrence`-th write (1-based) to `address` from now on,
    /// counting across resets
    #[allow(dead_code)]
    pub fn fail_write_to(&self, address: u8, occurrence: usize) {
        self.state
            .borrow_mut()
            .fail_write_to
            .insert(address, occurrence);
    }

    /// Get the operations log
    pub fn operations(&self) -> Vec<Operation> {
        self.state.borrow().operations.clone()
    }

    /// Clear the operations and mode logs
    pub fn clear_operations(&self) {
        let mut state = self.state.borrow_mut();
        state.operations.clear();
        state.mode_changes.clear();
    }

    /// Every value written to a register, in order
    pub fn writes_to(&self, address: u8) -> Vec<u32> {
        self.state
            .borrow()
            .operations
            .iter()
            .filter_map(|op| match op {
                Operation::Write { address: a, value } if *a == address => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Last value written to `ADC_CONTROL`
    pub fn last_control_write(&self) -> Option<u32> {
        self.writes_to(ADC_CONTROL).last().copied()
    }

    /// MODE field of the last `ADC_CONTROL` write
    pub fn last_mode_written(&self) -> Option<u32> {
        self.last_control_write().map(|value| (value >> 2) & 0xF)
    }

    /// Every mode change with the channels enabled at the time
    pub fn mode_changes(&self) -> Vec<ModeChange> {
        self.state.borrow().mode_changes.clone()
    }

    /// Number of reset pulses received
    #[allow(dead_code)]
    pub fn resets(&self) -> usize {
        self.state.borrow().resets
    }
}

/// Mock error type
#[derive(Debug, Clone, PartialEq)]
pub enum MockError {
    /// Simulated communication error
    Communication,
}

impl RegisterInterface for MockInterface {
    type Error = MockError;
    type AddressType = u8;

    fn read_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        read_data: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();

        // Check for injected failure
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(MockError::Communication);
        }

        state.operations.push(Operation::Read {
            address,
            len: read_data.len(),
        });

        match address {
            STATUS => {
                read_data[0] = state.status_read();
            }
            DATA => {
                let data = state.registers[usize::from(DATA)].to_be_bytes();
                read_data[..3].copy_from_slice(&data[1..]);
                if read_data.len() == 4 {
                    read_data[3] = state.status;
                }
                // Reading data clears RDY
                state.status |= RDY;
            }
            _ => {
                let value = state.registers[usize::from(address)].to_be_bytes();
                let len = read_data.len();
                read_data.copy_from_slice(&value[4 - len..]);
            }
        }

        Ok(())
    }

    fn write_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        write_data: &[u8],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();

        // Check for injected failure
        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(MockError::Communication);
        }
        if let Some(remaining) = state.fail_write_to.get_mut(&address) {
            *remaining -= 1;
            if *remaining == 0 {
                state.fail_write_to.remove(&address);
                return Err(MockError::Communication);
            }
        }

        let value = write_data
            .iter()
            .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
        state.operations.push(Operation::Write { address, value });
        state.registers[usize::from(address)] = value;

        if address == ADC_CONTROL {
            state.control_written(value);
        }

        Ok(())
    }
}

impl SerialReset for MockInterface {
    fn reset(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.power_on();
        state.operations.push(Operation::Reset);
        state.resets += 1;
        Ok(())
    }
}

impl Default for MockInterface {
    fn default() -> Self {
        Self::new()
    }
}
