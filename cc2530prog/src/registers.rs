//! XDATA mapped registers and status bits of the CC2530.
//!
//! All addresses are in the 16-bit extended data space; the SFR aliases in
//! the 8-bit space are never used since injected `MOVX` instructions only
//! reach XDATA.

/// A register reachable through XDATA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// First byte of the factory programmed IEEE extended address.
    ExtAddr0,
    DbgData,
    Fctl,
    FaddrL,
    FaddrH,
    FwData,
    ChipInfo0,
    ChipInfo1,
    ClkConSta,
    ClkConCmd,
    MemCtr,
    Dma1CfgH,
    Dma1CfgL,
    DmaArm,
}

impl Register {
    pub const ALL: [Register; 14] = [
        Register::ExtAddr0,
        Register::DbgData,
        Register::Fctl,
        Register::FaddrL,
        Register::FaddrH,
        Register::FwData,
        Register::ChipInfo0,
        Register::ChipInfo1,
        Register::ClkConSta,
        Register::ClkConCmd,
        Register::MemCtr,
        Register::Dma1CfgH,
        Register::Dma1CfgL,
        Register::DmaArm,
    ];

    pub const fn address(self) -> u16 {
        match self {
            Register::ExtAddr0 => 0x616A,
            Register::DbgData => 0x6260,
            Register::Fctl => 0x6270,
            Register::FaddrL => 0x6271,
            Register::FaddrH => 0x6272,
            Register::FwData => 0x6273,
            Register::ChipInfo0 => 0x6276,
            Register::ChipInfo1 => 0x6277,
            Register::ClkConSta => 0x709E,
            Register::ClkConCmd => 0x70C6,
            Register::MemCtr => 0x70C7,
            Register::Dma1CfgH => 0x70D3,
            Register::Dma1CfgL => 0x70D4,
            Register::DmaArm => 0x70D6,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Register::ExtAddr0 => "X_EXT_ADDR0",
            Register::DbgData => "DBGDATA",
            Register::Fctl => "FCTL",
            Register::FaddrL => "FADDRL",
            Register::FaddrH => "FADDRH",
            Register::FwData => "FWDATA",
            Register::ChipInfo0 => "CHIPINFO0",
            Register::ChipInfo1 => "CHIPINFO1",
            Register::ClkConSta => "CLKCONSTA",
            Register::ClkConCmd => "CLKCONCMD",
            Register::MemCtr => "MEMCTR",
            Register::Dma1CfgH => "DMA1CFGH",
            Register::Dma1CfgL => "DMA1CFGL",
            Register::DmaArm => "DMAARM",
        }
    }

    /// The register at `address`, if it is one we know about.
    pub fn from_address(address: u16) -> Option<Register> {
        Register::ALL
            .into_iter()
            .find(|register| register.address() == address)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#06x})", self.name(), self.address())
    }
}

/// Describe an XDATA address for log messages.
pub fn describe(address: u16) -> String {
    match Register::from_address(address) {
        Some(register) => register.to_string(),
        None => format!("{address:#06x}"),
    }
}

/// Bits of the debug status byte returned by most commands.
pub mod status {
    pub const STACK_OVERFLOW: u8 = 0x01;
    pub const OSCILLATOR_STABLE: u8 = 0x02;
    pub const DEBUG_LOCKED: u8 = 0x04;
    pub const HALT_STATUS: u8 = 0x08;
    pub const POWER_MODE_0: u8 = 0x10;
    pub const CPU_HALTED: u8 = 0x20;
    pub const PCON_IDLE: u8 = 0x40;
    pub const CHIP_ERASE_BUSY: u8 = 0x80;
}

/// `FCTL` bits and commands.
pub mod fctl {
    pub const BUSY: u8 = 0x80;
    /// Start a DMA fed write at `FADDR`.
    pub const WRITE: u8 = 0x06;
}

/// Debug configuration value enabling DMA while halted, with the timers
/// suspended.
pub const CONFIG_DMA_ENABLED: u8 = 0x22;

/// `CLKCONCMD` value selecting the 32 MHz crystal.
pub const CLOCK_32MHZ_XOSC: u8 = 0x80;
