pub trait BusInterface {
    /// Read a byte from the 16-bit address space.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the 16-bit address space.
    fn write(&mut self, address: u16, value: u8);

    /// Internal operation cycle with no bus access.
    fn idle(&mut self);
}
