//! Bucket counts. Each entry is the next prime after 1.7 times the previous one, starting at
//! 101 and ending at the largest prime below the pointer width.

#[cfg(target_pointer_width = "64")]
static PRIMES: [usize; 99] = [
    101, 173, 263, 397, 599, 907, 1_361, 2_053, 3_083, 4_637, 6_959, 10_453, 15_683, 23_531,
    35_311, 52_967, 79_451, 119_179, 178_781, 268_189, 402_299, 603_457, 905_189, 1_357_787,
    2_036_687, 3_055_043, 4_582_577, 6_873_871, 10_310_819, 15_466_229, 23_199_347, 34_799_021,
    52_198_537, 78_297_827, 117_446_801, 176_170_229, 264_255_353, 396_383_041, 594_574_583,
    891_861_923, 1_337_792_887, 2_006_689_337, 3_010_034_021, 4_515_051_137, 6_772_576_709,
    10_158_865_069, 15_238_297_621, 22_857_446_471, 34_286_169_707, 51_429_254_599, 77_143_881_917,
    115_715_822_899, 173_573_734_363, 260_360_601_547, 390_540_902_329, 585_811_353_559,
    878_717_030_339, 1_318_075_545_511, 1_977_113_318_311, 2_965_669_977_497, 4_448_504_966_249,
    6_672_757_449_409, 10_009_136_174_239, 15_013_704_261_371, 22_520_556_392_057,
    33_780_834_588_157, 50_671_251_882_247, 76_006_877_823_377, 114_010_316_735_089,
    171_015_475_102_649, 256_523_212_653_977, 384_784_818_980_971, 577_177_228_471_507,
    865_765_842_707_309, 1_298_648_764_060_979, 1_947_973_146_091_477, 2_921_959_719_137_273,
    4_382_939_578_705_967, 6_574_409_368_058_969, 9_861_614_052_088_471, 14_792_421_078_132_871,
    22_188_631_617_199_337, 33_282_947_425_799_017, 49_924_421_138_698_549, 74_886_631_708_047_827,
    112_329_947_562_071_807, 168_494_921_343_107_851, 252_742_382_014_661_767,
    379_113_573_021_992_729, 568_670_359_532_989_111, 853_005_539_299_483_657,
    1_279_508_308_949_225_477, 1_919_262_463_423_838_231, 2_878_893_695_135_757_317,
    4_318_340_542_703_636_011, 6_477_510_814_055_453_699, 9_716_266_221_083_181_299,
    14_574_399_331_624_771_603, 18_446_744_073_709_551_557,
];

#[cfg(not(target_pointer_width = "64"))]
static PRIMES: [usize; 44] = [
    101, 173, 263, 397, 599, 907, 1_361, 2_053, 3_083, 4_637, 6_959, 10_453, 15_683, 23_531,
    35_311, 52_967, 79_451, 119_179, 178_781, 268_189, 402_299, 603_457, 905_189, 1_357_787,
    2_036_687, 3_055_043, 4_582_577, 6_873_871, 10_310_819, 15_466_229, 23_199_347, 34_799_021,
    52_198_537, 78_297_827, 117_446_801, 176_170_229, 264_255_353, 396_383_041, 594_574_583,
    891_861_923, 1_337_792_887, 2_006_689_337, 3_010_034_021, 4_294_967_291,
];

/// Smallest tabled prime `>= n`, clamped to the largest one.
pub fn next_prime(n: usize) -> usize {
    let i = PRIMES.partition_point(|&p| p < n);
    PRIMES[i.min(PRIMES.len() - 1)]
}

/// Largest bucket count a table will ever use.
pub fn max_prime() -> usize {
    PRIMES[PRIMES.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_bound_semantics() {
        assert_eq!(next_prime(0), 101);
        assert_eq!(next_prime(7), 101);
        assert_eq!(next_prime(101), 101);
        assert_eq!(next_prime(102), 173);
        assert_eq!(next_prime(usize::MAX), max_prime());
    }

    #[test]
    fn table_is_strictly_ascending_primes() {
        assert!(PRIMES.windows(2).all(|w| w[0] < w[1]));
        // Trial division is cheap enough for the small end of the table.
        for &p in PRIMES.iter().take_while(|&&p| p < 1_000_000) {
            assert!((2..).take_while(|d| d * d <= p).all(|d| p % d != 0), "{p} is not prime");
        }
    }
}
