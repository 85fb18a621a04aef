use super::*;
use test_log::test;

const NMI_HANDLER: u16 = 0x9000;

// LDA #$81; STA $4200; INC $10; BRA -4
const COUNTER_PROGRAM: &[u8] = &[0xA9, 0x81, 0x8D, 0x00, 0x42, 0xE6, 0x10, 0x80, 0xFC];

fn lorom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0; 0x8000];
    rom[..program.len()].copy_from_slice(program);
    rom[0x7FD5] = 0x20;
    rom[0x7FFA..0x7FFC].copy_from_slice(&NMI_HANDLER.to_le_bytes());
    rom[0x7FFC..0x7FFE].copy_from_slice(&[0x00, 0x80]);
    // INC $11; RTI
    let handler = usize::from(NMI_HANDLER - 0x8000);
    rom[handler..handler + 3].copy_from_slice(&[0xE6, 0x11, 0x40]);
    rom
}

fn new_snes() -> Snes {
    Snes::create(lorom(COUNTER_PROGRAM), None, SnesConfig::default()).unwrap()
}

#[derive(Debug, PartialEq)]
struct TraceEntry {
    clocks: u64,
    registers: Registers,
    counters: [u8; 2],
}

fn trace(snes: &mut Snes, frames: usize) -> Vec<TraceEntry> {
    let mut entries = Vec::new();
    for _ in 0..frames {
        for _ in 0..50 {
            snes.synchronize(ThreadId::Cpu);
            entries.push(TraceEntry {
                clocks: snes.cpu_clocks(),
                registers: snes.registers().clone(),
                counters: [snes.wram()[0x10], snes.wram()[0x11]],
            });
        }
        snes.run_frame();
    }
    entries
}

#[test]
fn create_rejects_tiny_rom() {
    let result = Snes::create(vec![0; 0x1000], None, SnesConfig::default());
    assert!(matches!(result, Err(SnesLoadError::RomTooSmall { len: 0x1000 })));
}

#[test]
fn first_instruction_runs_from_reset_vector() {
    let mut snes = new_snes();
    // Reset sequence
    snes.synchronize(ThreadId::Cpu);
    assert_eq!(snes.registers().pc, 0x8000);
    assert_eq!(snes.cpu_clocks(), 186);

    // Retires the interrupt check, then LDA #$81
    snes.synchronize(ThreadId::Cpu);
    snes.synchronize(ThreadId::Cpu);
    assert_eq!(snes.registers().pc, 0x8002);
}

#[test]
fn run_frame_stops_at_vblank() {
    let mut snes = new_snes();

    snes.run_frame();
    assert_eq!(snes.frame_count(), 1);
    let first = snes.cpu_clocks();
    // Line 225 starts 225 * 1364 clocks in; the PPU catches up at the next scanline or port access
    assert!(first >= 225 * 1364, "{first}");
    assert!(first < 227 * 1364, "{first}");

    snes.run_frame();
    assert_eq!(snes.frame_count(), 2);
    assert!(snes.cpu_clocks() > first);
}

#[test]
fn run_frame_boundaries_stay_on_the_frame_grid() {
    let mut snes = new_snes();
    snes.run_frame();

    let frame_clocks = 262 * 1364_i64;
    let mut previous = snes.cpu_clocks();
    for _ in 0..8 {
        snes.run_frame();
        let clocks = snes.cpu_clocks();
        let delta = (clocks - previous) as i64;
        assert!((delta - frame_clocks).abs() < 200, "frame took {delta} clocks");
        previous = clocks;
    }
}

#[test]
fn nmi_handler_runs_every_frame() {
    let mut snes = new_snes();
    snes.run_frame();

    let before = snes.wram()[0x11];
    for _ in 0..3 {
        snes.run_frame();
    }
    assert_eq!(snes.wram()[0x11].wrapping_sub(before), 3);
}

#[test]
fn cpu_completes_ipl_handshake_with_smp() {
    let program = [
        // wait: LDA $2140; CMP #$AA; BNE wait
        0xAD, 0x40, 0x21, 0xC9, 0xAA, 0xD0, 0xF9,
        // LDA #$01; STA $2141; LDA #$CC; STA $2140
        0xA9, 0x01, 0x8D, 0x41, 0x21, 0xA9, 0xCC, 0x8D, 0x40, 0x21,
        // echo: CMP $2140; BNE echo
        0xCD, 0x40, 0x21, 0xD0, 0xFB,
        // done: BRA done
        0x80, 0xFE,
    ];
    let mut snes = Snes::create(lorom(&program), None, SnesConfig::default()).unwrap();

    for _ in 0..3 {
        snes.run_frame();
    }

    assert_eq!(snes.registers().pc, 0x8016);
    assert_eq!(snes.board.smp.read_port(0x2140), 0xCC);
    assert_eq!(snes.board.smp.read_port(0x2141), 0xBB);
}

#[test]
fn run_to_save_leaves_no_pending_desync() {
    let mut snes = new_snes();
    snes.run_frame();

    snes.run_to_save();
    assert_eq!(snes.board.scheduler.current(), ThreadId::Cpu);
    assert!(!snes.board.scheduler.desynchronized());
}

#[test]
fn save_state_round_trip_replays_identically() {
    let mut snes = new_snes();
    snes.run_frame();
    for _ in 0..100 {
        snes.synchronize(ThreadId::Cpu);
    }

    let state = snes.save_state().unwrap();
    assert!(state.starts_with(b"SNESSTATE"));

    let mut restored = new_snes();
    restored.run_frame();
    restored.load_state(&state).unwrap();
    assert_eq!(restored.cpu_clocks(), snes.cpu_clocks());
    assert_eq!(restored.wram(), snes.wram());

    let expected = trace(&mut snes, 3);
    let actual = trace(&mut restored, 3);
    assert_eq!(actual, expected);
}

#[test]
fn load_state_keeps_running_rom() {
    let mut snes = new_snes();
    let state = snes.save_state().unwrap();
    let pc = snes.registers().pc;

    snes.load_state(&state).unwrap();
    assert_eq!(snes.registers().pc, pc);

    // Still fetching from the cartridge after the ROM was moved over
    snes.run_frame();
    assert_eq!(snes.frame_count(), 1);
    let pc = snes.registers().pc;
    assert!((0x8005..0x8009).contains(&pc) || (NMI_HANDLER..NMI_HANDLER + 3).contains(&pc));
}

#[test]
fn load_state_rejects_bad_prefix() {
    let mut snes = new_snes();
    assert!(matches!(snes.load_state(b"NOTASTATE\x01\x00"), Err(SnesError::StatePrefix)));
    assert!(matches!(snes.load_state(b"SNESSTATE\x01"), Err(SnesError::StatePrefix)));
}

#[test]
fn load_state_rejects_other_version() {
    let mut snes = new_snes();
    let mut state = snes.save_state().unwrap();
    state[STATE_PREFIX.len()] = 0xFF;

    assert!(matches!(
        snes.load_state(&state),
        Err(SnesError::StateVersion { expected: STATE_VERSION, actual: 0x00FF })
    ));
}

#[test]
fn load_state_rejects_other_rom() {
    let mut other = Snes::create(lorom(&[0xEA, 0x80, 0xFD]), None, SnesConfig::default()).unwrap();
    let state = other.save_state().unwrap();

    let mut snes = new_snes();
    assert_ne!(other.rom_crc32(), snes.rom_crc32());
    assert!(matches!(snes.load_state(&state), Err(SnesError::StateRomMismatch { .. })));
}

#[test]
fn set_joypad_targets_port() {
    let mut snes = new_snes();
    let state = SnesJoypadState { start: true, ..SnesJoypadState::default() };

    snes.set_joypad(JoypadPort::Two, state);
    assert_eq!(snes.board.joypads[0].state(), SnesJoypadState::default());
    assert_eq!(snes.board.joypads[1].state(), state);
}
