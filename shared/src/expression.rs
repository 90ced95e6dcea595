use serde::{Deserialize, Serialize};

/// Channels of the facial/hand pose buffer, in buffer order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    NeckUpDown,
    NeckLeftRight,
    NeckTiltLeftRight,
    HeadUpDown,
    HeadLeftRight,
    HeadTiltLeftRight,
    JawOpenClose,
    JawForwardBack,
    JawLeftRight,
    MouthLeftRight,
    MouthUpDown,
    MouthNarrowPucker,
    TongueOut,
    TongueCurl,
    TongueUpDown,
    TongueLeftRight,
    TongueWideNarrow,
    LeftMouthSmileFrown,
    RightMouthSmileFrown,
    LeftLowerLipUpDown,
    RightLowerLipUpDown,
    LeftUpperLipUpDown,
    RightUpperLipUpDown,
    LeftCheekPuffSquint,
    RightCheekPuffSquint,
    NoseSneer,
    LeftEyeOpenClose,
    RightEyeOpenClose,
    LeftEyeUpDown,
    RightEyeUpDown,
    LeftEyeInOut,
    RightEyeInOut,
    BrowsIn,
    LeftBrowUpDown,
    RightBrowUpDown,
    MidBrowUpDown,
    LeftGrasp,
    RightGrasp,
    LeftPeace,
    RightPeace,
    LeftRude,
    RightRude,
    LeftPoint,
    RightPoint,
}

impl Expression {
    pub const COUNT: usize = 44;

    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_layout() {
        assert_eq!(Expression::NeckUpDown.index(), 0);
        assert_eq!(Expression::JawOpenClose.index(), 6);
        assert_eq!(Expression::RightPoint.index(), Expression::COUNT - 1);
    }
}
