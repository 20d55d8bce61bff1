//! Phone numbers in international format, per country.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct PhonePlan {
    /// ISO 3166-1 alpha-2
    pub country: &'static str,
    pub calling_code: &'static str,
    /// Digits after the calling code, area code included
    pub national_length: usize,
    pub area_codes: &'static [&'static str],
}

pub const PHONE_PLANS: &[PhonePlan] = &[
    PhonePlan {
        country: "US",
        calling_code: "1",
        national_length: 10,
        area_codes: &["212", "310", "415", "512", "617", "702", "808", "917"],
    },
    PhonePlan {
        country: "CA",
        calling_code: "1",
        national_length: 10,
        area_codes: &["403", "416", "514", "604", "613", "902"],
    },
    PhonePlan {
        country: "GB",
        calling_code: "44",
        national_length: 10,
        area_codes: &["20", "113", "121", "131", "161", "7700"],
    },
    PhonePlan {
        country: "DE",
        calling_code: "49",
        national_length: 10,
        area_codes: &["30", "40", "69", "89", "221", "151"],
    },
    PhonePlan {
        country: "FR",
        calling_code: "33",
        national_length: 9,
        area_codes: &["1", "2", "3", "4", "5", "6", "7"],
    },
    PhonePlan {
        country: "ES",
        calling_code: "34",
        national_length: 9,
        area_codes: &["91", "93", "95", "96", "6"],
    },
    PhonePlan {
        country: "IT",
        calling_code: "39",
        national_length: 10,
        area_codes: &["02", "06", "011", "055", "081", "333"],
    },
    PhonePlan {
        country: "NL",
        calling_code: "31",
        national_length: 9,
        area_codes: &["10", "20", "30", "70", "6"],
    },
    PhonePlan {
        country: "AU",
        calling_code: "61",
        national_length: 9,
        area_codes: &["2", "3", "7", "8", "4"],
    },
    PhonePlan {
        country: "JP",
        calling_code: "81",
        national_length: 10,
        area_codes: &["3", "6", "45", "52", "90"],
    },
    PhonePlan {
        country: "BR",
        calling_code: "55",
        national_length: 11,
        area_codes: &["11", "21", "31", "41", "61"],
    },
    PhonePlan {
        country: "IN",
        calling_code: "91",
        national_length: 10,
        area_codes: &["11", "22", "33", "44", "80"],
    },
];

pub fn plan_for(country: &str) -> Option<&'static PhonePlan> {
    PHONE_PLANS.iter().find(|p| p.country.eq_ignore_ascii_case(country))
}

/// `+<calling code> <area> <subscriber>` with the subscriber split in two
/// groups. Unknown or missing countries fall back to a random plan.
pub fn phone_number<R: Rng + ?Sized>(country: Option<&str>, rng: &mut R) -> String {
    let plan = country
        .and_then(plan_for)
        .or_else(|| PHONE_PLANS.choose(rng))
        .unwrap_or(&PHONE_PLANS[0]);
    format_number(plan, rng)
}

fn format_number<R: Rng + ?Sized>(plan: &PhonePlan, rng: &mut R) -> String {
    let area = plan.area_codes.choose(rng).copied().unwrap_or("1");
    let subscriber_length = plan.national_length.saturating_sub(area.len()).max(4);

    let mut subscriber = String::with_capacity(subscriber_length);
    subscriber.push(char::from(b'0' + rng.gen_range(2..=9u8)));
    for _ in 1..subscriber_length {
        subscriber.push(char::from(b'0' + rng.gen_range(0..=9u8)));
    }

    let (head, tail) = subscriber.split_at(subscriber_length / 2);
    format!("+{} {} {} {}", plan.calling_code, area, head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;

    #[test]
    fn numbers_have_the_national_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for plan in PHONE_PLANS {
            for _ in 0..20 {
                let number = phone_number(Some(plan.country), &mut rng);
                let prefix = format!("+{} ", plan.calling_code);
                assert!(number.starts_with(&prefix), "{}", number);
                let digits = number[prefix.len()..].chars().filter(|c| c.is_ascii_digit()).count();
                assert_eq!(digits, plan.national_length, "{}", number);
            }
        }
    }

    #[test]
    fn numbers_fit_the_phone_column_type() {
        let pattern = Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$").unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let number = phone_number(None, &mut rng);
            assert!(pattern.is_match(&number), "{}", number);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(plan_for("gb").map(|p| p.calling_code), Some("44"));
        assert!(plan_for("ZZ").is_none());
    }
}
