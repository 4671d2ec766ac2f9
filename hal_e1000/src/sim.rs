//! Simulated e1000
//!
//! [`SimulatedDevice`] plays the DMA engine: it shares a [`RegisterFile`]
//! with the driver and walks the descriptor rings by bus address, honouring
//! the same done-bit protocol as the silicon. [`SimulatedNic`] pairs it with
//! an attached driver so the rings are guaranteed to outlive every access.

use crate::config::E1000Config;
use crate::descriptor::{RxDescriptor, RxStatus, TxDescriptor, TxStatus, DESCRIPTOR_SIZE};
use crate::driver::{E1000, E1000_STATUS_EXPECTED};
use crate::error::NicError;
use crate::regs::{Registers, RingRegisters, RX_RING, STATUS, TX_RING};
use crate::ring::advance;
use crate::rx::RX_BUFFER_SIZE;
use crate::tx::TX_PACKET_SIZE;
use hal::{MmioWindow, RegisterFile};
use std::ptr;
use std::sync::atomic::{fence, Ordering};

/// Size of the e1000 register BAR
pub const REGISTER_WINDOW_SIZE: usize = 0x20000;

/// Ring placement as programmed by the driver
#[derive(Debug, Clone, Copy)]
struct RingGeometry {
    base: u64,
    len: usize,
}

/// Device model behind a simulated register window
pub struct SimulatedDevice {
    regs: Registers<RegisterFile>,
    tx: Option<RingGeometry>,
    rx: Option<RingGeometry>,
    transmitted: u64,
    dropped: u64,
}

impl SimulatedDevice {
    /// A device that identifies as an 82540EM
    pub fn new() -> Result<Self, NicError> {
        Self::with_status(E1000_STATUS_EXPECTED)
    }

    /// A device whose status register reads `status`
    pub fn with_status(status: u32) -> Result<Self, NicError> {
        let window = RegisterFile::new(REGISTER_WINDOW_SIZE)?;
        window.write(STATUS, status);
        Ok(Self {
            regs: Registers::new(window),
            tx: None,
            rx: None,
            transmitted: 0,
            dropped: 0,
        })
    }

    /// The driver's view of the registers
    pub fn window(&self) -> RegisterFile {
        self.regs.window().clone()
    }

    /// Frames put on the wire so far
    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }

    /// Frames that arrived with nowhere to go
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Captures the ring base and length registers
    ///
    /// Real hardware reads these when the ring is enabled; later writes to
    /// the base registers are ignored by the model.
    fn latch(&mut self) {
        self.tx = Self::geometry(&self.regs, TX_RING);
        self.rx = Self::geometry(&self.regs, RX_RING);
    }

    fn geometry(regs: &Registers<RegisterFile>, ring: RingRegisters) -> Option<RingGeometry> {
        let base = regs.ring_base(ring);
        let len = regs.ring_len(ring) as usize / DESCRIPTOR_SIZE;
        if base == 0 || len == 0 {
            return None;
        }
        Some(RingGeometry { base, len })
    }

    /// Refuses cursor values outside the ring
    fn cursor(register: u32, len: usize) -> Option<usize> {
        let index = register as usize;
        if index >= len {
            log::warn!("sim e1000: cursor {} outside ring of {}", index, len);
            return None;
        }
        Some(index)
    }

    /// Transmits every descriptor between head and tail
    ///
    /// Returns the frames in wire order. In loopback mode each frame is also
    /// offered to the receive ring.
    ///
    /// # Safety
    ///
    /// The rings latched at attach, and the buffers their descriptors point
    /// at, must still be allocated.
    unsafe fn complete_transmits(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let Some(geometry) = self.tx else {
            return frames;
        };
        if !self.regs.transmit_control().enable {
            return frames;
        }
        let (Some(mut head), Some(tail)) = (
            Self::cursor(self.regs.ring_head(TX_RING), geometry.len),
            Self::cursor(self.regs.ring_tail(TX_RING), geometry.len),
        ) else {
            return frames;
        };

        fence(Ordering::Acquire);
        let descriptors = geometry.base as usize as *mut TxDescriptor;
        while head != tail {
            let slot = descriptors.add(head);
            let mut desc = ptr::read_volatile(slot);
            let length = usize::from(desc.length).min(TX_PACKET_SIZE);

            let mut frame = vec![0u8; length];
            let buffer = desc.buffer_addr as usize as *const u8;
            ptr::copy_nonoverlapping(buffer, frame.as_mut_ptr(), length);

            desc.status = desc.status | TxStatus::DD.bits();
            ptr::write_volatile(slot, desc);
            frames.push(frame);
            head = advance(head, geometry.len);
        }
        fence(Ordering::Release);
        self.regs.set_ring_head(TX_RING, head as u32);
        self.transmitted += frames.len() as u64;

        if self.regs.receive_control().loopback {
            for frame in &frames {
                self.fill_receive(frame, RxStatus::DD | RxStatus::EOP);
            }
        }
        frames
    }

    /// Writes `data` into the receive slot at head
    ///
    /// # Safety
    ///
    /// Same as [`Self::complete_transmits`].
    unsafe fn fill_receive(&mut self, data: &[u8], status: RxStatus) -> bool {
        let Some(geometry) = self.rx else {
            self.dropped += 1;
            return false;
        };
        if !self.regs.receive_control().enable || data.len() > RX_BUFFER_SIZE {
            self.dropped += 1;
            return false;
        }
        let (Some(head), Some(tail)) = (
            Self::cursor(self.regs.ring_head(RX_RING), geometry.len),
            Self::cursor(self.regs.ring_tail(RX_RING), geometry.len),
        ) else {
            self.dropped += 1;
            return false;
        };
        if head == tail {
            log::trace!("sim e1000: receive ring full, dropping {} bytes", data.len());
            self.dropped += 1;
            return false;
        }

        let slot = (geometry.base as usize as *mut RxDescriptor).add(head);
        let mut desc = ptr::read_volatile(slot);
        let buffer = desc.buffer_addr as usize as *mut u8;
        ptr::copy_nonoverlapping(data.as_ptr(), buffer, data.len());
        fence(Ordering::Release);

        desc.length = data.len() as u16;
        desc.errors = 0;
        desc.status = status.bits();
        ptr::write_volatile(slot, desc);
        self.regs
            .set_ring_head(RX_RING, advance(head, geometry.len) as u32);
        true
    }
}

/// A driver attached to a simulated device
///
/// The driver is never handed out mutably or by value, so the rings the
/// device model dereferences live exactly as long as this pair.
pub struct SimulatedNic {
    driver: E1000<RegisterFile>,
    device: SimulatedDevice,
}

impl SimulatedNic {
    /// Builds a device and attaches a driver to it
    pub fn attach(config: E1000Config) -> Result<Self, NicError> {
        Self::attach_device(SimulatedDevice::new()?, config)
    }

    /// Attaches a driver to an existing device model
    pub fn attach_device(
        mut device: SimulatedDevice,
        config: E1000Config,
    ) -> Result<Self, NicError> {
        let driver = E1000::attach(device.window(), config)?;
        device.latch();
        Ok(Self { driver, device })
    }

    pub fn transmit(&mut self, frame: &[u8]) -> Result<(), NicError> {
        self.driver.transmit(frame)
    }

    pub fn receive(&mut self, out: &mut [u8]) -> Result<usize, NicError> {
        self.driver.receive(out)
    }

    pub fn driver(&self) -> &E1000<RegisterFile> {
        &self.driver
    }

    pub fn device(&self) -> &SimulatedDevice {
        &self.device
    }

    /// Lets the device drain the transmit ring
    pub fn complete_transmits(&mut self) -> Vec<Vec<u8>> {
        // SAFETY: `self.driver` owns the latched rings and outlives this call.
        unsafe { self.device.complete_transmits() }
    }

    /// Delivers a frame from the wire; false if it was dropped
    pub fn inject_frame(&mut self, frame: &[u8]) -> bool {
        // SAFETY: see `complete_transmits`.
        unsafe { self.device.fill_receive(frame, RxStatus::DD | RxStatus::EOP) }
    }

    /// Delivers the first descriptor of a multi-descriptor frame
    pub fn inject_fragment(&mut self, data: &[u8]) -> bool {
        // SAFETY: see `complete_transmits`.
        unsafe { self.device.fill_receive(data, RxStatus::DD) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rx::{RxSlot, RX_RING_SIZE};
    use crate::tx::{TxSlot, TX_RING_SIZE};

    fn nic() -> SimulatedNic {
        SimulatedNic::attach(E1000Config::default()).unwrap()
    }

    #[test]
    fn test_transmit_completes_on_device() {
        let mut nic = nic();
        nic.transmit(b"HELLO").unwrap();
        nic.transmit(b"WORLD!").unwrap();
        assert_eq!(nic.driver().tx().slot(0), TxSlot::InFlight);

        let frames = nic.complete_transmits();
        assert_eq!(frames, vec![b"HELLO".to_vec(), b"WORLD!".to_vec()]);
        assert_eq!(nic.driver().tx().slot(0), TxSlot::Free);
        assert_eq!(nic.driver().tx().in_flight(), 0);
        assert_eq!(nic.device().transmitted(), 2);
        assert!(nic.complete_transmits().is_empty());
    }

    #[test]
    fn test_full_ring_drains_and_refills() {
        let mut nic = nic();
        for i in 0..TX_RING_SIZE - 1 {
            nic.transmit(&[i as u8]).unwrap();
        }
        assert_eq!(nic.transmit(b"late"), Err(NicError::RingFull));

        assert_eq!(nic.complete_transmits().len(), TX_RING_SIZE - 1);
        assert!(nic.transmit(b"late").is_ok());
    }

    #[test]
    fn test_injected_frame_is_received() {
        let mut nic = nic();
        assert!(nic.inject_frame(b"from the wire"));
        assert_eq!(nic.driver().rx().slot(0), RxSlot::HasData { length: 13 });

        let mut buf = [0u8; RX_BUFFER_SIZE];
        let n = nic.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"from the wire");
        assert_eq!(nic.receive(&mut buf), Err(NicError::RingEmpty));
    }

    #[test]
    fn test_receive_ring_full_drops() {
        let mut nic = nic();
        for _ in 0..RX_RING_SIZE - 1 {
            assert!(nic.inject_frame(b"x"));
        }
        assert!(!nic.inject_frame(b"overflow"));
        assert_eq!(nic.device().dropped(), 1);

        let mut buf = [0u8; 16];
        nic.receive(&mut buf).unwrap();
        assert!(nic.inject_frame(b"fits again"));
    }

    #[test]
    fn test_oversized_injection_dropped() {
        let mut nic = nic();
        assert!(!nic.inject_frame(&[0u8; RX_BUFFER_SIZE + 1]));
        assert_eq!(nic.device().dropped(), 1);
    }

    #[test]
    fn test_fragment_is_unsupported() {
        let mut nic = nic();
        assert!(nic.inject_fragment(b"first half"));

        let mut buf = [0u8; 64];
        assert_eq!(
            nic.receive(&mut buf),
            Err(NicError::UnsupportedFraming { index: 0 })
        );
    }

    #[test]
    fn test_loopback_returns_transmitted_frames() {
        let config = E1000Config {
            loopback: true,
            ..E1000Config::default()
        };
        let mut nic = SimulatedNic::attach(config).unwrap();
        nic.transmit(b"echo").unwrap();
        nic.complete_transmits();

        let mut buf = [0u8; 64];
        let n = nic.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"echo");
    }

    #[test]
    fn test_wrong_identity_fails_attach() {
        let device = SimulatedDevice::with_status(0x1234).unwrap();
        assert!(matches!(
            SimulatedNic::attach_device(device, E1000Config::default()),
            Err(NicError::DeviceIdentity { found: 0x1234, .. })
        ));
    }

    #[test]
    fn test_rebased_ring_is_ignored() {
        let mut nic = nic();
        nic.driver()
            .registers()
            .set_ring_base(TX_RING, 0xDEAD_0000);
        nic.transmit(b"still safe").unwrap();
        assert_eq!(nic.complete_transmits(), vec![b"still safe".to_vec()]);
    }
}
