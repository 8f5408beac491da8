// Chronologically sortable child keys.
//
// Layout: 8 characters of millisecond timestamp followed by 12 random
// characters, both drawn from an alphabet whose ASCII order matches its
// numeric order. Keys generated in the same millisecond reuse the random
// tail incremented by one so they still sort in creation order.

use rand::Rng;

const ALPHABET: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
pub struct PushIdGenerator {
    last_time: i64,
    last_random: [u8; RANDOM_CHARS],
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self, now_ms: i64) -> String {
        let duplicate_time = now_ms == self.last_time;
        self.last_time = now_ms;

        if duplicate_time {
            self.increment_random();
        } else {
            let mut rng = rand::thread_rng();
            for slot in self.last_random.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
        }

        let mut id = String::with_capacity(TIME_CHARS + RANDOM_CHARS);
        let mut time_chars = [0u8; TIME_CHARS];
        let mut t = now_ms.max(0);
        for slot in time_chars.iter_mut().rev() {
            *slot = ALPHABET[(t % 64) as usize];
            t /= 64;
        }
        id.extend(time_chars.iter().map(|&b| b as char));
        id.extend(self.last_random.iter().map(|&i| ALPHABET[i as usize] as char));
        id
    }

    fn increment_random(&mut self) {
        for slot in self.last_random.iter_mut().rev() {
            if *slot == 63 {
                *slot = 0;
            } else {
                *slot += 1;
                return;
            }
        }
    }
}

/// Decode the millisecond timestamp embedded in a push key.
pub fn timestamp_of(id: &str) -> Option<i64> {
    if id.len() < TIME_CHARS {
        return None;
    }
    id.bytes().take(TIME_CHARS).try_fold(0i64, |acc, b| {
        let digit = ALPHABET.iter().position(|&a| a == b)? as i64;
        Some(acc * 64 + digit)
    })
}
