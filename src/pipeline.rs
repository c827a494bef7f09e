/// Hardware execution units a cost is attributed to. Vector-core (AIV) and
/// cube-core (AIC) pipes run concurrently, so costs are kept per pipe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum PipeType {
    #[strum(serialize = "AIV_VEC")]
    AivVec,
    /// GM -> UB copy engine
    #[strum(serialize = "AIV_MTE2")]
    AivMte2,
    /// UB -> GM copy engine
    #[strum(serialize = "AIV_MTE3")]
    AivMte3,
    #[strum(serialize = "AIV_SCALAR")]
    AivScalar,
    /// L1 -> L0A/L0B
    #[strum(serialize = "AIC_MTE1")]
    AicMte1,
    /// GM -> L1
    #[strum(serialize = "AIC_MTE2")]
    AicMte2,
    #[strum(serialize = "AIC_CUBE")]
    AicCube,
    #[strum(serialize = "AIC_FIXPIPE")]
    AicFixpipe,
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_names_round_trip() {
        assert_eq!(PipeType::iter().count(), 8);
        for pipe in PipeType::iter() {
            assert_eq!(pipe.to_string().parse::<PipeType>(), Ok(pipe));
        }
        assert_eq!("AIC_FIXPIPE".parse::<PipeType>(), Ok(PipeType::AicFixpipe));
        assert!("AIV_MTE4".parse::<PipeType>().is_err());
    }
}
