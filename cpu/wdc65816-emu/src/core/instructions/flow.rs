use crate::core::{SoftwareInterrupt, StatusRegister, Wdc65816};
use crate::traits::BusInterface;

pub(super) fn branch<B: BusInterface>(
    cpu: &mut Wdc65816,
    bus: &mut B,
    condition: fn(&StatusRegister) -> bool,
) {
    if !condition(&cpu.registers.p) {
        cpu.last_cycle(bus);
        cpu.fetch(bus);
        return;
    }

    let offset = cpu.fetch(bus) as i8;
    let target = cpu.registers.pc.wrapping_add(offset as u16);
    cpu.idle6(bus, target);
    cpu.last_cycle(bus);
    bus.idle();
    cpu.registers.pc = target;
}

// BRL: Branch always long
pub(super) fn brl<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let offset = cpu.fetch_u16(bus);
    let target = cpu.registers.pc.wrapping_add(offset);
    cpu.last_cycle(bus);
    bus.idle();
    cpu.registers.pc = target;
}

// JMP addr
pub(super) fn jmp_absolute<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let lsb = cpu.fetch(bus);
    cpu.last_cycle(bus);
    let msb = cpu.fetch(bus);
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
}

// JML long
pub(super) fn jml_long<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let address = cpu.fetch_u16(bus);
    cpu.last_cycle(bus);
    let bank = cpu.fetch(bus);
    cpu.registers.pc = address;
    cpu.registers.pbr = bank;
}

// JMP (addr)
pub(super) fn jmp_indirect<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let pointer = cpu.fetch_u16(bus);
    let lsb = bus.read(pointer.into());
    cpu.last_cycle(bus);
    let msb = bus.read(pointer.wrapping_add(1).into());
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
}

// JMP (addr,X)
pub(super) fn jmp_indexed_indirect<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let pointer = cpu.fetch_u16(bus);
    bus.idle();
    cpu.registers.pc = read_program_bank_pointer(cpu, bus, pointer);
}

// JML [addr]
pub(super) fn jml_indirect<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let pointer = cpu.fetch_u16(bus);
    let lsb = bus.read(pointer.into());
    let msb = bus.read(pointer.wrapping_add(1).into());
    cpu.last_cycle(bus);
    let bank = bus.read(pointer.wrapping_add(2).into());
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
    cpu.registers.pbr = bank;
}

// JSR addr
pub(super) fn jsr_absolute<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let target = cpu.fetch_u16(bus);
    bus.idle();

    let [return_lsb, return_msb] = cpu.registers.pc.wrapping_sub(1).to_le_bytes();
    cpu.push(bus, return_msb);
    cpu.last_cycle(bus);
    cpu.push(bus, return_lsb);

    cpu.registers.pc = target;
}

// JSL long
pub(super) fn jsl<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let target = cpu.fetch_u16(bus);
    cpu.push_native(bus, cpu.registers.pbr);
    bus.idle();
    let bank = cpu.fetch(bus);

    let [return_lsb, return_msb] = cpu.registers.pc.wrapping_sub(1).to_le_bytes();
    cpu.push_native(bus, return_msb);
    cpu.last_cycle(bus);
    cpu.push_native(bus, return_lsb);

    cpu.registers.pc = target;
    cpu.registers.pbr = bank;
    cpu.fix_emulation_stack();
}

// JSR (addr,X)
pub(super) fn jsr_indexed_indirect<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    let pointer_lsb = cpu.fetch(bus);

    let [return_lsb, return_msb] = cpu.registers.pc.to_le_bytes();
    cpu.push_native(bus, return_msb);
    cpu.push_native(bus, return_lsb);

    let pointer_msb = cpu.fetch(bus);
    bus.idle();

    let pointer = u16::from_le_bytes([pointer_lsb, pointer_msb]);
    cpu.registers.pc = read_program_bank_pointer(cpu, bus, pointer);
    cpu.fix_emulation_stack();
}

fn read_program_bank_pointer<B: BusInterface>(cpu: &Wdc65816, bus: &mut B, pointer: u16) -> u16 {
    let bank = u32::from(cpu.registers.pbr) << 16;
    let pointer = pointer.wrapping_add(cpu.registers.x);

    let lsb = bus.read(bank | u32::from(pointer));
    cpu.last_cycle(bus);
    let msb = bus.read(bank | u32::from(pointer.wrapping_add(1)));
    u16::from_le_bytes([lsb, msb])
}

// RTS
pub(super) fn rts<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    bus.idle();
    let lsb = cpu.pull(bus);
    let msb = cpu.pull(bus);
    cpu.last_cycle(bus);
    bus.idle();
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]).wrapping_add(1);
}

// RTL
pub(super) fn rtl<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    bus.idle();
    let lsb = cpu.pull_native(bus);
    let msb = cpu.pull_native(bus);
    cpu.last_cycle(bus);
    let bank = cpu.pull_native(bus);

    cpu.registers.pc = u16::from_le_bytes([lsb, msb]).wrapping_add(1);
    cpu.registers.pbr = bank;
    cpu.fix_emulation_stack();
}

// RTI
pub(super) fn rti<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    bus.idle();

    let p = cpu.pull(bus);
    cpu.registers.set_p(p);

    let lsb = cpu.pull(bus);
    if cpu.registers.emulation_mode {
        cpu.last_cycle(bus);
        let msb = cpu.pull(bus);
        cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
        return;
    }

    let msb = cpu.pull(bus);
    cpu.last_cycle(bus);
    let bank = cpu.pull(bus);
    cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
    cpu.registers.pbr = bank;
}

// BRK / COP
pub(super) fn software_interrupt<B: BusInterface>(
    cpu: &mut Wdc65816,
    bus: &mut B,
    interrupt: SoftwareInterrupt,
) {
    // Signature byte
    cpu.fetch(bus);

    let emulation_mode = cpu.registers.emulation_mode;
    if !emulation_mode {
        cpu.push(bus, cpu.registers.pbr);
    }
    let [pc_lsb, pc_msb] = cpu.registers.pc.to_le_bytes();
    cpu.push(bus, pc_msb);
    cpu.push(bus, pc_lsb);

    // In emulation mode bit 4 is the B flag, which is always set here
    cpu.push(bus, cpu.registers.p.into());

    cpu.registers.p.irq_disabled = true;
    cpu.registers.p.decimal_mode = false;

    let vector =
        if emulation_mode { interrupt.emulation_vector() } else { interrupt.native_vector() };
    cpu.jump_to_vector(bus, vector);
}

// WAI
pub(super) fn wai<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    cpu.last_cycle(bus);
    bus.idle();
    cpu.waiting = true;
}

// STP
pub(super) fn stp<B: BusInterface>(cpu: &mut Wdc65816, bus: &mut B) {
    bus.idle();
    cpu.last_cycle(bus);
    bus.idle();
    cpu.stopped = true;
}
