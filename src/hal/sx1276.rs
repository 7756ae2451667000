//! SX1276 LoRa transceiver driver
//!
//! SPI register access + DIO0 packet-received interrupt.
//! Reference: Semtech SX1276/77/78/79 datasheet rev. 7, LoRa mode only.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiDevice};

use crate::config::RadioConfig;
use crate::radio::{status, RadioDriver, StatusCode};
use crate::signal::PacketSignal;

/// Value of `REG_VERSION` on a genuine SX1276.
pub const SX1276_VERSION: u8 = 0x12;

/// SX1276 register addresses (LoRa page)
pub mod regs {
    pub const FIFO: u8 = 0x00;
    pub const OP_MODE: u8 = 0x01;
    pub const FRF_MSB: u8 = 0x06;
    pub const FRF_MID: u8 = 0x07;
    pub const FRF_LSB: u8 = 0x08;
    pub const PA_CONFIG: u8 = 0x09;
    pub const OCP: u8 = 0x0B;
    pub const LNA: u8 = 0x0C;
    pub const FIFO_ADDR_PTR: u8 = 0x0D;
    pub const FIFO_TX_BASE_ADDR: u8 = 0x0E;
    pub const FIFO_RX_BASE_ADDR: u8 = 0x0F;
    pub const FIFO_RX_CURRENT_ADDR: u8 = 0x10;
    pub const IRQ_FLAGS_MASK: u8 = 0x11;
    pub const IRQ_FLAGS: u8 = 0x12;
    pub const RX_NB_BYTES: u8 = 0x13;
    pub const PKT_SNR_VALUE: u8 = 0x19;
    pub const PKT_RSSI_VALUE: u8 = 0x1A;
    pub const MODEM_CONFIG_1: u8 = 0x1D;
    pub const MODEM_CONFIG_2: u8 = 0x1E;
    pub const PREAMBLE_MSB: u8 = 0x20;
    pub const PREAMBLE_LSB: u8 = 0x21;
    pub const MODEM_CONFIG_3: u8 = 0x26;
    pub const FEI_MSB: u8 = 0x28;
    pub const FEI_MID: u8 = 0x29;
    pub const FEI_LSB: u8 = 0x2A;
    pub const DETECTION_OPTIMIZE: u8 = 0x31;
    pub const DETECTION_THRESHOLD: u8 = 0x37;
    pub const SYNC_WORD: u8 = 0x39;
    pub const DIO_MAPPING_1: u8 = 0x40;
    pub const VERSION: u8 = 0x42;
    pub const PA_DAC: u8 = 0x4D;
}

/// `REG_OP_MODE` bits
pub mod mode {
    pub const LONG_RANGE: u8 = 0x80;
    pub const SLEEP: u8 = 0x00;
    pub const STANDBY: u8 = 0x01;
    pub const RX_CONTINUOUS: u8 = 0x05;
}

/// `REG_IRQ_FLAGS` bits
pub mod irq {
    pub const RX_TIMEOUT: u8 = 0x80;
    pub const RX_DONE: u8 = 0x40;
    pub const PAYLOAD_CRC_ERROR: u8 = 0x20;
    pub const VALID_HEADER: u8 = 0x10;
    pub const ALL: u8 = 0xFF;
}

/// Crystal frequency.
const FXOSC_HZ: u64 = 32_000_000;

/// Above this carrier the HF RSSI offset applies.
const HF_PORT_MIN_HZ: u32 = 779_000_000;

/// Version register poll attempts before giving up.
const VERSION_RETRIES: u8 = 10;

/// Bandwidth (Hz) → `MODEM_CONFIG_1` BW field.
const BANDWIDTHS: [(u32, u8); 10] = [
    (7_800, 0),
    (10_400, 1),
    (15_600, 2),
    (20_800, 3),
    (31_250, 4),
    (41_700, 5),
    (62_500, 6),
    (125_000, 7),
    (250_000, 8),
    (500_000, 9),
];

/// SX1276 driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sx1276Error {
    /// SPI communication error
    Spi,
    /// Reset line could not be driven
    Reset,
    /// Chip not responding or wrong version
    ChipNotFound,
    /// Configuration value out of range (carries the status code)
    InvalidConfig(StatusCode),
    /// DIO0 interrupt could not be installed or re-enabled
    Interrupt,
}

impl Sx1276Error {
    /// Status code reported through [`RadioDriver`].
    pub fn status(&self) -> StatusCode {
        match *self {
            Sx1276Error::Spi => status::SPI_WRITE_FAILED,
            Sx1276Error::Reset => status::UNKNOWN,
            Sx1276Error::ChipNotFound => status::CHIP_NOT_FOUND,
            Sx1276Error::InvalidConfig(code) => code,
            Sx1276Error::Interrupt => status::UNKNOWN,
        }
    }
}

/// DIO0 line as seen by the driver.
///
/// On ESP-IDF this wraps a GPIO `PinDriver` with a rising-edge ISR.
pub trait ReceiveInterrupt {
    /// Install a handler that calls `signal.raise()` and nothing else.
    fn attach(&mut self, signal: &'static PacketSignal) -> Result<(), Sx1276Error>;

    /// Re-enable after servicing a packet (GPIO ISRs on ESP-IDF are
    /// one-shot).
    fn rearm(&mut self) -> Result<(), Sx1276Error>;
}

/// SX1276 driver
pub struct Sx1276<SPI, RST, IRQ, DELAY> {
    spi: SPI,
    reset: RST,
    dio0: IRQ,
    delay: DELAY,
    config: RadioConfig,
}

impl<SPI, RST, IRQ, DELAY> Sx1276<SPI, RST, IRQ, DELAY>
where
    SPI: SpiDevice,
    RST: OutputPin,
    IRQ: ReceiveInterrupt,
    DELAY: DelayNs,
{
    /// Create new SX1276 driver. No bus traffic until `begin()`.
    pub fn new(spi: SPI, reset: RST, dio0: IRQ, delay: DELAY, config: RadioConfig) -> Self {
        Self {
            spi,
            reset,
            dio0,
            delay,
            config,
        }
    }

    /// Check every modem parameter before touching the chip.
    fn validate(config: &RadioConfig) -> Result<u8, Sx1276Error> {
        let bw = BANDWIDTHS
            .iter()
            .find(|(hz, _)| *hz == config.bandwidth_hz)
            .map(|(_, code)| *code)
            .ok_or(Sx1276Error::InvalidConfig(status::INVALID_BANDWIDTH))?;

        if !(6..=12).contains(&config.spreading_factor) {
            return Err(Sx1276Error::InvalidConfig(status::INVALID_SPREADING_FACTOR));
        }
        if !(5..=8).contains(&config.coding_rate) {
            return Err(Sx1276Error::InvalidConfig(status::INVALID_CODING_RATE));
        }
        if !(137_000_000..=1_020_000_000).contains(&config.frequency_hz) {
            return Err(Sx1276Error::InvalidConfig(status::INVALID_FREQUENCY));
        }
        if !(2..=17).contains(&config.output_power_dbm) {
            return Err(Sx1276Error::InvalidConfig(status::INVALID_OUTPUT_POWER));
        }
        if config.preamble_len < 6 {
            return Err(Sx1276Error::InvalidConfig(status::INVALID_PREAMBLE_LENGTH));
        }

        Ok(bw)
    }

    /// Hardware reset, probe, and full LoRa configuration. Leaves the chip
    /// in standby.
    pub fn init(&mut self) -> Result<(), Sx1276Error> {
        use regs::*;

        let bw_code = Self::validate(&self.config)?;
        let cfg = self.config;

        // Reset pulse: >100 µs low, then 5 ms until ready
        self.reset.set_low().map_err(|_| Sx1276Error::Reset)?;
        self.delay.delay_ms(1);
        self.reset.set_high().map_err(|_| Sx1276Error::Reset)?;
        self.delay.delay_ms(5);

        self.probe()?;

        // LoRa bit can only change in sleep
        self.write_reg(OP_MODE, mode::SLEEP)?;
        self.write_reg(OP_MODE, mode::LONG_RANGE | mode::SLEEP)?;

        self.set_frequency(cfg.frequency_hz)?;

        // Whole FIFO for RX
        self.write_reg(FIFO_TX_BASE_ADDR, 0x00)?;
        self.write_reg(FIFO_RX_BASE_ADDR, 0x00)?;

        // Max LNA gain + HF boost; AGC set in MODEM_CONFIG_3
        self.write_reg(LNA, 0x23)?;

        // Explicit header
        self.write_reg(MODEM_CONFIG_1, (bw_code << 4) | ((cfg.coding_rate - 4) << 1))?;

        let crc = if cfg.crc { 0x04 } else { 0x00 };
        self.write_reg(MODEM_CONFIG_2, (cfg.spreading_factor << 4) | crc)?;

        // Low data rate optimize above 16 ms symbol time
        let symbol_us = (1u64 << cfg.spreading_factor) * 1_000_000 / cfg.bandwidth_hz as u64;
        let ldro = if symbol_us > 16_000 { 0x08 } else { 0x00 };
        self.write_reg(MODEM_CONFIG_3, 0x04 | ldro)?;

        if cfg.spreading_factor == 6 {
            self.write_reg(DETECTION_OPTIMIZE, 0x05)?;
            self.write_reg(DETECTION_THRESHOLD, 0x0C)?;
        } else {
            self.write_reg(DETECTION_OPTIMIZE, 0x03)?;
            self.write_reg(DETECTION_THRESHOLD, 0x0A)?;
        }

        self.write_reg(PREAMBLE_MSB, (cfg.preamble_len >> 8) as u8)?;
        self.write_reg(PREAMBLE_LSB, cfg.preamble_len as u8)?;
        self.write_reg(SYNC_WORD, cfg.sync_word)?;

        // PA_BOOST, Pout = 2 + OutputPower; 100 mA OCP
        self.write_reg(PA_CONFIG, 0x80 | (cfg.output_power_dbm - 2) as u8)?;
        self.write_reg(PA_DAC, 0x84)?;
        self.write_reg(OCP, 0x20 | 0x0B)?;

        self.write_reg(OP_MODE, mode::LONG_RANGE | mode::STANDBY)
    }

    fn probe(&mut self) -> Result<(), Sx1276Error> {
        for _ in 0..VERSION_RETRIES {
            if self.read_reg(regs::VERSION)? == SX1276_VERSION {
                return Ok(());
            }
            self.delay.delay_ms(10);
        }
        Err(Sx1276Error::ChipNotFound)
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), Sx1276Error> {
        let frf = ((hz as u64) << 19) / FXOSC_HZ;
        self.write_reg(regs::FRF_MSB, (frf >> 16) as u8)?;
        self.write_reg(regs::FRF_MID, (frf >> 8) as u8)?;
        self.write_reg(regs::FRF_LSB, frf as u8)
    }

    /// DIO0 = RxDone, clear flags, enter RX continuous.
    pub fn receive_continuous(&mut self) -> Result<(), Sx1276Error> {
        use regs::*;

        self.write_reg(DIO_MAPPING_1, 0x00)?;
        self.write_reg(IRQ_FLAGS, irq::ALL)?;
        self.write_reg(FIFO_ADDR_PTR, 0x00)?;
        self.write_reg(OP_MODE, mode::LONG_RANGE | mode::RX_CONTINUOUS)
    }

    /// Read the pending packet, clear the IRQ flags, re-enable DIO0.
    ///
    /// DIO0 is re-armed even when the bus fails mid-read; a one-shot
    /// interrupt left disabled would stop all further receive.
    fn read_packet(&mut self, buf: &mut [u8]) -> Result<PacketRead, Sx1276Error> {
        let read = self.fetch_packet(buf);
        let cleared = self.write_reg(regs::IRQ_FLAGS, irq::ALL);
        let rearmed = self.dio0.rearm();

        let read = read?;
        cleared?;
        rearmed?;
        Ok(read)
    }

    /// Classify the IRQ flags and copy the payload out of the FIFO.
    ///
    /// A payload with a CRC error is still pulled out of the FIFO so the
    /// next packet starts clean.
    fn fetch_packet(&mut self, buf: &mut [u8]) -> Result<PacketRead, Sx1276Error> {
        use regs::*;

        let flags = self.read_reg(IRQ_FLAGS)?;
        if flags & irq::RX_TIMEOUT != 0 || flags & irq::RX_DONE == 0 {
            return Ok(PacketRead::Nothing);
        }

        let len = (self.read_reg(RX_NB_BYTES)? as usize).min(buf.len());
        let addr = self.read_reg(FIFO_RX_CURRENT_ADDR)?;
        self.write_reg(FIFO_ADDR_PTR, addr)?;
        self.read_burst(FIFO, &mut buf[..len])?;

        if flags & irq::PAYLOAD_CRC_ERROR != 0 {
            Ok(PacketRead::CrcError)
        } else {
            Ok(PacketRead::Packet(len))
        }
    }

    /// Last packet SNR in dB.
    pub fn packet_snr(&mut self) -> Result<f32, Sx1276Error> {
        let raw = self.read_reg(regs::PKT_SNR_VALUE)? as i8;
        Ok(raw as f32 / 4.0)
    }

    /// Last packet RSSI in dBm (datasheet §5.5.5).
    pub fn packet_rssi(&mut self) -> Result<f32, Sx1276Error> {
        let offset = if self.config.frequency_hz >= HF_PORT_MIN_HZ {
            -157.0
        } else {
            -164.0
        };
        let raw = self.read_reg(regs::PKT_RSSI_VALUE)? as f32;
        let snr = self.packet_snr()?;

        if snr < 0.0 {
            Ok(offset + raw + snr)
        } else {
            Ok(offset + raw * 16.0 / 15.0)
        }
    }

    /// Last packet frequency error in Hz, from the 20-bit FEI register.
    pub fn packet_frequency_error(&mut self) -> Result<f32, Sx1276Error> {
        let msb = self.read_reg(regs::FEI_MSB)? as u32 & 0x0F;
        let mid = self.read_reg(regs::FEI_MID)? as u32;
        let lsb = self.read_reg(regs::FEI_LSB)? as u32;

        let raw = (msb << 16) | (mid << 8) | lsb;
        // Sign-extend 20 bits
        let raw = ((raw << 12) as i32) >> 12;

        let hz_per_lsb = (1u32 << 24) as f32 / FXOSC_HZ as f32;
        Ok(raw as f32 * hz_per_lsb * (self.config.bandwidth_hz as f32 / 500_000.0))
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Sx1276Error> {
        let mut buf = [0u8; 1];
        self.read_burst(reg, &mut buf)?;
        Ok(buf[0])
    }

    fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Sx1276Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[reg & 0x7F]), Operation::Read(buf)])
            .map_err(|_| Sx1276Error::Spi)
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<(), Sx1276Error> {
        self.spi
            .write(&[reg | 0x80, val])
            .map_err(|_| Sx1276Error::Spi)
    }
}

enum PacketRead {
    Packet(usize),
    CrcError,
    Nothing,
}

impl<SPI, RST, IRQ, DELAY> RadioDriver for Sx1276<SPI, RST, IRQ, DELAY>
where
    SPI: SpiDevice,
    RST: OutputPin,
    IRQ: ReceiveInterrupt,
    DELAY: DelayNs,
{
    const NAME: &'static str = "SX1276";

    fn begin(&mut self) -> Result<(), StatusCode> {
        self.init().map_err(|e| e.status())
    }

    fn start_receive(&mut self) -> Result<(), StatusCode> {
        self.receive_continuous().map_err(|e| e.status())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, StatusCode> {
        match self.read_packet(buf).map_err(|e| e.status())? {
            PacketRead::Packet(len) => Ok(len),
            PacketRead::CrcError => Err(status::CRC_MISMATCH),
            PacketRead::Nothing => Err(status::RX_TIMEOUT),
        }
    }

    fn rssi(&mut self) -> f32 {
        self.packet_rssi().unwrap_or(f32::NAN)
    }

    fn snr(&mut self) -> f32 {
        self.packet_snr().unwrap_or(f32::NAN)
    }

    fn frequency_error(&mut self) -> f32 {
        self.packet_frequency_error().unwrap_or(f32::NAN)
    }

    fn set_packet_received_action(
        &mut self,
        signal: &'static PacketSignal,
    ) -> Result<(), StatusCode> {
        self.dio0.attach(signal).map_err(|e| e.status())
    }
}
