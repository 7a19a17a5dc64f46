use rand::Rng;

pub const MAX_SEQUENTIAL: u32 = 999;
const RANDOM_SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IdStrategy {
    /// Zero-padded 3-digit counter, wrapping 999 -> 001.
    #[default]
    Sequential,
    /// Base-36 timestamp with a random suffix.
    Random,
}

/// Next counter value after the largest 1-3 digit id in `ids`.
pub fn next_sequential<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let max = ids
        .into_iter()
        .map(str::trim)
        .filter(|id| (1..=3).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|id| id.parse::<u32>().ok())
        .max();
    let next = match max {
        None => 1,
        Some(max) if max >= MAX_SEQUENTIAL => 1,
        Some(max) => max + 1,
    };
    format!("{:03}", next)
}

/// Used when the store cannot be read while allocating a sequential id.
pub fn timestamp_fallback(millis: i64) -> String {
    format!("{:03}", millis.unsigned_abs() % 1000)
}

pub fn random_token<R: Rng>(millis: i64, rng: &mut R) -> String {
    let mut token = to_base36(millis.unsigned_abs());
    for _ in 0..RANDOM_SUFFIX_LEN {
        token.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    token
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
