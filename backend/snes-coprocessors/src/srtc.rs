//! S-RTC coprocessor, a Sharp real-time clock chip
//!
//! Used by Daikaijuu Monogatari II. The chip is clocked at 1 Hz: each run of [`SRtc::main`]
//! advances the time by one second, so emulated time follows emulated CPU time instead of the
//! host clock. The host clock (or a configured epoch) only seeds the initial time.

use crate::common::Coprocessor;
use bincode::{Decode, Encode};
use snes_common::thread::Thread;
use snes_common::timeutils;
use time::{OffsetDateTime, Weekday};

pub const SRTC_FREQUENCY: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
enum ReadState {
    #[default]
    Ack,
    Digit {
        idx: u8,
    },
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
enum WriteState {
    #[default]
    Start,
    Command,
    Digit {
        idx: u8,
    },
    End,
}

trait WeekdayExt {
    fn to_srtc_u8(self) -> u8;
}

impl WeekdayExt for Weekday {
    fn to_srtc_u8(self) -> u8 {
        self.number_days_from_sunday()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
struct Time {
    seconds: u8,
    minutes: u8,
    hours: u8,
    day: u8,
    month: u8,
    year: u8,
    // Century digit relative to 1000 AD (9 = 19xx, 10 = 20xx)
    century: u8,
    day_of_week: u8,
}

impl Time {
    fn from_unix_timestamp(timestamp: i64) -> Self {
        let datetime = OffsetDateTime::from_unix_timestamp(timestamp).unwrap_or_else(|err| {
            log::error!("Invalid S-RTC epoch {timestamp}: {err}; using the Unix epoch instead");
            OffsetDateTime::UNIX_EPOCH
        });

        let year = datetime.year().clamp(1000, 2599) as u16;
        Self {
            seconds: datetime.second(),
            minutes: datetime.minute(),
            hours: datetime.hour(),
            day: datetime.day(),
            month: datetime.month().into(),
            year: (year % 100) as u8,
            century: (year / 100 - 10) as u8,
            day_of_week: datetime.weekday().to_srtc_u8(),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SRtc {
    thread: Thread,
    time: Time,
    read_state: ReadState,
    write_state: WriteState,
}

impl SRtc {
    /// Create an S-RTC whose clock starts at `epoch` seconds since the Unix epoch, or at the
    /// current host time if `epoch` is `None`.
    #[must_use]
    pub fn new(epoch: Option<i64>) -> Self {
        let timestamp = epoch.unwrap_or_else(timeutils::current_time_secs);
        log::info!("S-RTC initial timestamp: {timestamp}");

        Self {
            thread: Thread::new(SRTC_FREQUENCY),
            time: Time::from_unix_timestamp(timestamp),
            read_state: ReadState::default(),
            write_state: WriteState::default(),
        }
    }

    fn read_register(&mut self) -> u8 {
        self.write_state = WriteState::default();

        match self.read_state {
            ReadState::Ack => {
                self.read_state = ReadState::Digit { idx: 0 };
                0x0F
            }
            ReadState::Digit { idx } => {
                let time = &self.time;
                let value = match idx {
                    0 => time.seconds % 10,
                    1 => time.seconds / 10,
                    2 => time.minutes % 10,
                    3 => time.minutes / 10,
                    4 => time.hours % 10,
                    5 => time.hours / 10,
                    6 => time.day % 10,
                    7 => time.day / 10,
                    8 => time.month,
                    9 => time.year % 10,
                    10 => time.year / 10,
                    11 => time.century,
                    _ => time.day_of_week,
                };

                self.read_state =
                    if idx >= 12 { ReadState::End } else { ReadState::Digit { idx: idx + 1 } };

                log::trace!("S-RTC read, sending value {value:X} for idx {idx}");

                value
            }
            ReadState::End => {
                self.read_state = ReadState::Ack;
                0x0F
            }
        }
    }

    fn write_register(&mut self, value: u8) {
        self.read_state = ReadState::default();

        // This is a 4-bit port
        let value = value & 0x0F;

        match self.write_state {
            WriteState::Start => {
                if value == 0x0E {
                    self.write_state = WriteState::Command;
                }
            }
            WriteState::Command => match value {
                0x04 => {
                    // Clears the time
                    self.time = Time {
                        seconds: 0,
                        minutes: 0,
                        hours: 0,
                        day: 1,
                        month: 1,
                        year: 0,
                        century: 9,
                        day_of_week: 0,
                    };
                    self.update_day_of_week();
                    self.write_state = WriteState::End;
                }
                0x00 => {
                    self.write_state = WriteState::Digit { idx: 0 };
                }
                _ => {}
            },
            WriteState::Digit { idx } => {
                self.write_timestamp_digit(idx, value);

                self.write_state =
                    if idx >= 11 { WriteState::End } else { WriteState::Digit { idx: idx + 1 } };
            }
            WriteState::End => {
                if value == 0x0D {
                    self.write_state = WriteState::Start;
                }
            }
        }
    }

    fn write_timestamp_digit(&mut self, idx: u8, value: u8) {
        let time = &mut self.time;
        match idx {
            0 => time.seconds = time.seconds / 10 * 10 + value,
            1 => time.seconds = 10 * value + time.seconds % 10,
            2 => time.minutes = time.minutes / 10 * 10 + value,
            3 => time.minutes = 10 * value + time.minutes % 10,
            4 => time.hours = time.hours / 10 * 10 + value,
            5 => time.hours = 10 * value + time.hours % 10,
            6 => time.day = time.day / 10 * 10 + value,
            7 => time.day = 10 * value + time.day % 10,
            8 => time.month = value,
            9 => time.year = time.year / 10 * 10 + value,
            10 => time.year = 10 * value + time.year % 10,
            _ => time.century = value,
        }

        if idx >= 6 {
            self.update_day_of_week();
        }

        log::trace!("S-RTC timestamp write, index {idx} value {value:X}; new time is {:?}", self.time);
    }

    fn update_day_of_week(&mut self) {
        let time = &mut self.time;
        time.day_of_week =
            timeutils::day_of_week(time.day, time.month, four_digit_year(time.year, time.century))
                .to_srtc_u8();
    }

    fn tick_second(&mut self) {
        let time = &mut self.time;

        time.seconds += 1;
        if time.seconds < 60 {
            return;
        }
        time.seconds = 0;

        time.minutes += 1;
        if time.minutes < 60 {
            return;
        }
        time.minutes = 0;

        time.hours += 1;
        if time.hours < 24 {
            return;
        }
        time.hours = 0;

        time.day += 1;
        time.day_of_week = (time.day_of_week + 1) % 7;
        if time.day <= timeutils::days_in_month(time.month, time.year) {
            return;
        }
        time.day = 1;

        time.month += 1;
        if time.month <= 12 {
            return;
        }
        time.month = 1;

        time.year += 1;
        if time.year > 99 {
            time.year = 0;
            time.century += 1;
        }
    }
}

impl Coprocessor for SRtc {
    fn name(&self) -> &'static str {
        "S-RTC"
    }

    fn thread(&self) -> Option<&Thread> {
        Some(&self.thread)
    }

    fn thread_mut(&mut self) -> Option<&mut Thread> {
        Some(&mut self.thread)
    }

    fn main(&mut self, cpu_frequency: u64) {
        self.tick_second();
        self.thread.step(1, cpu_frequency);
    }

    fn read(&mut self, address: u32, open_bus: u8) -> u8 {
        // $2800 is the data port; $2801 is write-only
        if address & 1 != 0 {
            return open_bus;
        }
        self.read_register()
    }

    fn write(&mut self, address: u32, value: u8) {
        log::trace!("S-RTC write {:04X} {value:02X}", address & 0xFFFF);

        if address & 1 != 0 {
            self.write_register(value);
        }
    }

    fn power(&mut self) {
        self.thread.reset();
        self.read_state = ReadState::default();
        self.write_state = WriteState::default();
    }
}

fn four_digit_year(year: u8, century: u8) -> u16 {
    1000 + 100 * u16::from(century) + u16::from(year)
}
