//! Driver bring-up and the process-facing operations

use crate::config::E1000Config;
use crate::error::NicError;
use crate::regs::Registers;
use crate::rx::RxRing;
use crate::tx::TxRing;
use hal::MmioWindow;

/// Status register value of an 82540EM after reset with link up
pub const E1000_STATUS_EXPECTED: u32 = 0x8008_0783;

/// An attached e1000
///
/// Owns its register window and both rings. Dropping the driver frees the
/// ring memory, so the device must be quiesced first.
pub struct E1000<W: MmioWindow> {
    regs: Registers<W>,
    tx: TxRing,
    rx: RxRing,
    config: E1000Config,
}

impl<W: MmioWindow> E1000<W> {
    /// Verifies the device and brings up both rings
    ///
    /// Transmit is enabled before receive is configured; receive control is
    /// written last so no frame lands before the ring is in place.
    pub fn attach(window: W, config: E1000Config) -> Result<Self, NicError> {
        config.validate()?;
        let regs = Registers::new(window);

        let status = regs.status();
        if status != E1000_STATUS_EXPECTED {
            log::error!("e1000: unexpected status {:#010x}", status);
            return Err(NicError::DeviceIdentity {
                expected: E1000_STATUS_EXPECTED,
                found: status,
            });
        }

        let tx = TxRing::init(&regs)?;
        regs.set_transmit_control(config.transmit_control());
        regs.set_inter_packet_gap(config.inter_packet_gap);

        regs.set_receive_address(config.mac);
        regs.clear_multicast_table();
        let rx = RxRing::init(&regs)?;
        regs.set_receive_control(config.receive_control());

        log::info!(
            "e1000: attached, status {:#010x}, mac {}, {} tx / {} rx descriptors",
            status,
            config.mac,
            tx.len(),
            rx.len()
        );

        Ok(Self {
            regs,
            tx,
            rx,
            config,
        })
    }

    /// Queues one frame for transmission
    pub fn transmit(&mut self, frame: &[u8]) -> Result<(), NicError> {
        self.tx.transmit(&self.regs, frame)
    }

    /// Copies the next received frame into `out`
    pub fn receive(&mut self, out: &mut [u8]) -> Result<usize, NicError> {
        self.rx.receive(&self.regs, out)
    }

    pub fn registers(&self) -> &Registers<W> {
        &self.regs
    }

    pub fn tx(&self) -> &TxRing {
        &self.tx
    }

    pub fn rx(&self) -> &RxRing {
        &self.rx
    }

    pub fn config(&self) -> &E1000Config {
        &self.config
    }
}
