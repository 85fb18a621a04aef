use super::*;
use crate::cartridge::Cartridge;
use crate::input::SnesJoypadState;
use test_log::test;

// LoROM: $00:8000 is ROM offset 0
const NMI_HANDLER: u16 = 0x9000;

struct Harness {
    core: Wdc65816,
    cpu: Cpu,
    board: Board,
}

impl Harness {
    fn new(program: &[u8]) -> Self {
        let mut rom = vec![0; 0x8000];
        rom[..program.len()].copy_from_slice(program);
        rom[0x7FD5] = 0x20;
        rom[0x7FFA..0x7FFC].copy_from_slice(&NMI_HANDLER.to_le_bytes());
        rom[0x7FFC..0x7FFE].copy_from_slice(&[0x00, 0x80]);
        // RTI
        rom[usize::from(NMI_HANDLER - 0x8000)] = 0x40;
        // Table for HDMA tests
        rom[0x0100..0x0107].copy_from_slice(&[0x83, 0x11, 0x22, 0x33, 0x01, 0x44, 0x00]);
        // Source bytes for DMA tests
        rom[0x0200..0x0204].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);

        let config = SnesConfig::default();
        let cartridge = Cartridge::create(rom, None, &config).unwrap();
        let timing_mode = cartridge.timing_mode();
        let board = Board::new(cartridge, &config).unwrap();

        Self { core: Wdc65816::new(), cpu: Cpu::new(timing_mode, &config), board }
    }

    fn bus(&mut self) -> CpuBus<'_> {
        CpuBus { cpu: &mut self.cpu, board: &mut self.board }
    }

    fn main(&mut self) {
        self.cpu.main(&mut self.core, &mut self.board);
    }
}

fn write_all(bus: &mut CpuBus<'_>, writes: &[(u32, u8)]) {
    for &(address, value) in writes {
        bus.write(address, value);
    }
}

fn cycle_clocks(bus: &mut CpuBus<'_>, address: u32) -> u64 {
    let start = bus.cpu.clocks();
    bus.read(address);
    bus.cpu.clocks() - start
}

#[test]
fn bus_cycle_lengths() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    assert_eq!(cycle_clocks(&mut bus, 0x000000), 8);
    assert_eq!(cycle_clocks(&mut bus, 0x7E0000), 8);
    assert_eq!(cycle_clocks(&mut bus, 0x002140), 6);
    assert_eq!(cycle_clocks(&mut bus, 0x004016), 12);
    assert_eq!(cycle_clocks(&mut bus, 0x004210), 6);
    assert_eq!(cycle_clocks(&mut bus, 0x008000), 8);
    assert_eq!(cycle_clocks(&mut bus, 0x808000), 8);

    // FastROM only applies to banks $80-$FF
    bus.write(0x00420D, 0x01);
    assert_eq!(cycle_clocks(&mut bus, 0x808000), 6);
    assert_eq!(cycle_clocks(&mut bus, 0xC00000), 6);
    assert_eq!(cycle_clocks(&mut bus, 0x008000), 8);
}

#[test]
fn internal_register_reads_keep_open_bus() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    bus.write(0x004300, 0x12);
    assert_eq!(bus.read(0x004300), 0x12);
    // Unused DMA register returns the last value on the bus
    bus.write(0x004301, 0x56);
    assert_eq!(bus.read(0x00430C), 0x56);
    assert_eq!(bus.cpu.mdr(), 0x56);

    assert_eq!(bus.read(0x002200), 0x56);
}

#[test]
fn wram_port_auto_increments() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    write_all(&mut bus, &[(0x2181, 0xFF), (0x2182, 0xFF), (0x2183, 0x00)]);
    bus.write(0x2180, 0xAB);
    bus.write(0x2180, 0xCD);

    assert_eq!(bus.read(0x7EFFFF), 0xAB);
    assert_eq!(bus.read(0x7F0000), 0xCD);
    assert_eq!(bus.cpu.io.wram_address.get(), 0x10001);

    // Only bit 0 of the bank byte is kept
    write_all(&mut bus, &[(0x2181, 0xFF), (0x2182, 0xFF), (0x2183, 0xFF)]);
    bus.write(0x2180, 0xEF);
    assert_eq!(bus.cpu.io.wram_address.get(), 0x00000);
    assert_eq!(bus.read(0x7FFFFF), 0xEF);
}

#[test]
fn multiplier_takes_eight_cycles() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    bus.write(0x4202, 12);
    bus.write(0x4203, 13);
    for _ in 0..8 {
        bus.idle();
    }

    assert_eq!(bus.read(0x4216), 156);
    assert_eq!(bus.read(0x4217), 0);
    // The quotient register is left holding operand B
    assert_eq!(bus.read(0x4214), 13);
}

#[test]
fn divider_takes_sixteen_cycles() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    write_all(&mut bus, &[(0x4204, 0xE8), (0x4205, 0x03), (0x4206, 7)]);
    for _ in 0..16 {
        bus.idle();
    }
    assert_eq!(bus.cpu.io.rddiv, 142);
    assert_eq!(bus.cpu.io.rdmpy, 6);

    // Division by zero: quotient all ones, remainder is the dividend
    bus.write(0x4206, 0);
    for _ in 0..16 {
        bus.idle();
    }
    assert_eq!(bus.cpu.io.rddiv, 0xFFFF);
    assert_eq!(bus.cpu.io.rdmpy, 1000);
}

#[test]
fn dma_mode_1_into_vram_port() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    write_all(
        &mut bus,
        &[
            // Increment after $2119, address 0
            (0x2115, 0x80),
            (0x2116, 0x00),
            (0x2117, 0x00),
            // A->B, mode 1 (two registers), $00:8200, 4 bytes
            (0x4300, 0x01),
            (0x4301, 0x18),
            (0x4302, 0x00),
            (0x4303, 0x82),
            (0x4304, 0x00),
            (0x4305, 0x04),
            (0x4306, 0x00),
            (0x420B, 0x01),
        ],
    );
    assert_eq!(bus.cpu.clocks(), 66);

    // The next cycle boundary notices the request; the one after runs the transfer
    bus.idle();
    assert_eq!(bus.cpu.clocks(), 72);
    bus.idle();

    // 8 to align, 8 DMA setup, 8 channel setup, 4 x 8 per byte, 4 to realign, then the idle itself
    assert_eq!(bus.cpu.clocks(), 138);
    assert!(!bus.cpu.channels[0].dma_enable);
    assert_eq!(bus.cpu.mdr(), 0x44);

    assert_eq!(&bus.board.ppu.vram()[..2], &[0x2211, 0x4433]);
    assert_eq!(bus.cpu.read_dma(0x4305), 0x00);
    assert_eq!(bus.cpu.read_dma(0x4302), 0x04);
}

#[test]
fn dma_size_zero_transfers_64k_bytes() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    write_all(
        &mut bus,
        &[
            // A->B, fixed source $00:8200 into WMDATA
            (0x4300, 0x08),
            (0x4301, 0x80),
            (0x4302, 0x00),
            (0x4303, 0x82),
            (0x4304, 0x00),
            (0x4305, 0x00),
            (0x4306, 0x00),
            (0x420B, 0x01),
        ],
    );

    let start = bus.cpu.clocks();
    bus.idle();
    bus.idle();

    assert_eq!(bus.cpu.io.wram_address.get(), 0x10000);
    assert!(!bus.cpu.channels[0].dma_enable);
    assert_eq!(bus.cpu.read_dma(0x4305), 0x00);
    assert_eq!(bus.cpu.read_dma(0x4306), 0x00);
    assert!(bus.cpu.clocks() - start >= 65536 * 8);
    assert_eq!(bus.board.wram.read(0xFFFF), 0x11);
}

#[test]
fn dma_from_wram_into_wram_port_is_dropped() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    write_all(
        &mut bus,
        &[
            (0x2181, 0x00),
            (0x2182, 0x01),
            (0x2183, 0x00),
            // A->B, $7E:1000 into WMDATA, 16 bytes
            (0x4300, 0x00),
            (0x4301, 0x80),
            (0x4302, 0x00),
            (0x4303, 0x10),
            (0x4304, 0x7E),
            (0x4305, 0x10),
            (0x4306, 0x00),
            (0x420B, 0x01),
        ],
    );
    bus.idle();
    bus.idle();

    // The reads happened, the writes did not
    assert_eq!(bus.cpu.read_dma(0x4302), 0x10);
    assert_eq!(bus.cpu.read_dma(0x4303), 0x10);
    assert_eq!(bus.cpu.io.wram_address.get(), 0x0100);
}

#[test]
fn hdma_repeat_entry_transfers_every_line() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    write_all(
        &mut bus,
        &[
            (0x2181, 0x00),
            (0x2182, 0x00),
            (0x2183, 0x00),
            // Direct table at $00:8100, mode 0 into WMDATA
            (0x4300, 0x00),
            (0x4301, 0x80),
            (0x4302, 0x00),
            (0x4303, 0x81),
            (0x4304, 0x00),
            (0x420C, 0x01),
        ],
    );

    bus.hdma_reset();
    bus.hdma_setup();
    for _ in 0..5 {
        bus.hdma_run();
    }

    // $83: repeat mode, one unit on each of 3 lines; then $01 with one unit; then $00 ends it
    let wram: Vec<u8> = (0..4).map(|address| bus.board.wram.read(address)).collect();
    assert_eq!(wram, [0x11, 0x22, 0x33, 0x44]);
    assert_eq!(bus.cpu.io.wram_address.get(), 4);
    assert_eq!(bus.cpu.read_dma(0x4308), 0x07);
    assert_eq!(bus.cpu.read_dma(0x4309), 0x81);
    assert_eq!(bus.cpu.read_dma(0x430A), 0x00);
    assert!(!bus.hdma_active());
}

#[test]
fn nmitimen_with_nmi_line_asserted_raises_transition() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    bus.cpu.status.nmi_line = true;
    bus.write(0x4200, 0x80);
    assert!(bus.cpu.status.nmi_transition);

    // The write locks out interrupt recognition until the next bus cycle
    bus.cpu.last_cycle(true);
    assert!(!bus.cpu.status.nmi_pending);

    bus.idle();
    bus.cpu.last_cycle(true);
    assert!(bus.cpu.status.nmi_pending);
    assert!(bus.cpu.status.interrupt_pending);
}

#[test]
fn vblank_raises_nmi_and_rdnmi_acknowledges() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    bus.write(0x4200, 0x80);
    while bus.cpu.counter.vcounter() < 225 || bus.cpu.counter.hcounter() < 16 {
        bus.step(2);
    }

    assert!(bus.cpu.status.nmi_line);
    assert!(bus.cpu.status.nmi_transition);

    assert_eq!(bus.read(0x4210), 0x82);
    assert_eq!(bus.read(0x4210), 0x02);
    assert_eq!(bus.read(0x4212) & 0x80, 0x80);
}

#[test]
fn htime_irq_fires_and_timeup_acknowledges() {
    let mut harness = Harness::new(&[]);
    let mut bus = harness.bus();

    write_all(&mut bus, &[(0x4207, 0x20), (0x4208, 0x00), (0x4200, 0x10)]);
    while bus.cpu.counter.vcounter() < 2 {
        bus.step(2);
    }

    assert!(bus.cpu.status.irq_line);
    assert_eq!(bus.read(0x4211) & 0x80, 0x80);
    assert_eq!(bus.read(0x4211) & 0x80, 0x00);

    // Disabling H/V IRQs acknowledges
    while !bus.cpu.status.irq_line {
        bus.step(2);
    }
    bus.write(0x4200, 0x00);
    assert!(!bus.cpu.status.irq_line);
    assert!(!bus.cpu.status.irq_transition);
}

#[test]
fn auto_joypad_read_fills_joy_registers() {
    let mut harness = Harness::new(&[]);
    harness.board.joypads[0].set_state(SnesJoypadState {
        b: true,
        start: true,
        ..SnesJoypadState::default()
    });
    let mut bus = harness.bus();

    bus.write(0x4200, 0x01);
    while bus.cpu.counter.vcounter() < 226 {
        bus.step(2);
    }
    assert_eq!(bus.read(0x4212) & 0x01, 0x01);

    while bus.cpu.counter.vcounter() < 233 {
        bus.step(2);
    }
    assert_eq!(bus.read(0x4212) & 0x01, 0x00);
    assert_eq!(bus.read(0x4218), 0x00);
    assert_eq!(bus.read(0x4219), 0x90);
    assert_eq!(bus.read(0x421A), 0x00);
}

#[test]
fn reset_fetches_vector_after_idle_cycles() {
    let mut harness = Harness::new(&[]);
    harness.main();

    assert_eq!(harness.core.registers().pc, 0x8000);
    assert!(harness.core.registers().emulation_mode);
    // 22 idle cycles, then the reset sequence: opcode fetch, idle, 3 stack reads, 2 vector reads
    assert_eq!(harness.cpu.clocks(), 22 * 6 + 8 + 6 + 3 * 8 + 2 * 8);
    assert!(harness.cpu.status.interrupt_pending);

    // The next call clears the pending flag without running anything
    harness.main();
    assert!(!harness.cpu.status.interrupt_pending);
    assert_eq!(harness.core.registers().pc, 0x8000);
}

#[test]
fn nmi_wakes_wai_at_vblank() {
    let program = [
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x42, // STA $4200
        0xCB, // WAI
        0xEA, // NOP
    ];
    let mut harness = Harness::new(&program);

    let mut iterations = 0;
    while harness.core.registers().pc != NMI_HANDLER {
        harness.main();
        iterations += 1;
        assert!(iterations < 100_000, "NMI never taken");
    }

    assert_eq!(harness.cpu.counter.vcounter(), 225);
    assert!(harness.cpu.counter.hcounter() < 200);
    assert!(harness.core.registers().p.irq_disabled);

    // The first call only retires the interrupt-pending flag, the second runs RTI
    harness.main();
    harness.main();
    assert_eq!(harness.core.registers().pc, 0x8006);
}
