pub trait BusInterface {
    /// Read a byte from the 24-bit address space.
    fn read(&mut self, address: u32) -> u8;

    /// Write a byte to the 24-bit address space.
    fn write(&mut self, address: u32, value: u8);

    /// Internal operation cycle with no bus access.
    fn idle(&mut self);

    /// Called immediately before the final bus cycle of every instruction and interrupt sequence.
    ///
    /// `irq_disabled` is the current value of the I flag.
    fn last_cycle(&mut self, irq_disabled: bool);

    /// Whether an interrupt will be taken at the next instruction boundary.
    fn interrupt_pending(&self) -> bool;
}
