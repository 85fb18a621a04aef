use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum TimingMode {
    #[default]
    Ntsc,
    Pal,
}

impl TimingMode {
    pub const ALL: [Self; 2] = [Self::Ntsc, Self::Pal];

    #[must_use]
    pub fn to_str(self) -> &'static str {
        match self {
            Self::Ntsc => "Ntsc",
            Self::Pal => "Pal",
        }
    }
}

impl Display for TimingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for TimingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.to_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid TimingMode string: '{s}'"))
    }
}
