use serde_json::{Map, Value};

/// The counted license classes: five primary codes plus the "difference"
/// group (upgrade courses), which shares one quota pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseClass {
    B,
    A1,
    A2,
    C,
    D,
    FarkA1,
    FarkA2,
    BakanlikA1,
}

impl LicenseClass {
    pub const ALL: [LicenseClass; 8] = [
        LicenseClass::B,
        LicenseClass::A1,
        LicenseClass::A2,
        LicenseClass::C,
        LicenseClass::D,
        LicenseClass::FarkA1,
        LicenseClass::FarkA2,
        LicenseClass::BakanlikA1,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LicenseClass::B => "B",
            LicenseClass::A1 => "A1",
            LicenseClass::A2 => "A2",
            LicenseClass::C => "C",
            LicenseClass::D => "D",
            LicenseClass::FarkA1 => "FARK_A1",
            LicenseClass::FarkA2 => "FARK_A2",
            LicenseClass::BakanlikA1 => "BAKANLIK_A1",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LicenseClass::B => "B Sınıfı",
            LicenseClass::A1 => "A1 Sınıfı",
            LicenseClass::A2 => "A2 Sınıfı",
            LicenseClass::C => "C Sınıfı",
            LicenseClass::D => "D Sınıfı",
            LicenseClass::FarkA1 => "Fark A1",
            LicenseClass::FarkA2 => "Fark A2",
            LicenseClass::BakanlikA1 => "Bakanlık A1",
        }
    }

    pub fn parse(code: &str) -> Option<LicenseClass> {
        LicenseClass::ALL.iter().copied().find(|c| c.code() == code)
    }

    pub fn default_fee(self) -> i64 {
        match self {
            LicenseClass::B => 15000,
            LicenseClass::A1 => 12000,
            LicenseClass::A2 => 12000,
            LicenseClass::C => 15000,
            LicenseClass::D => 15000,
            LicenseClass::FarkA1 => 10000,
            LicenseClass::FarkA2 => 12000,
            LicenseClass::BakanlikA1 => 7500,
        }
    }

    pub fn is_difference(self) -> bool {
        matches!(
            self,
            LicenseClass::FarkA1 | LicenseClass::FarkA2 | LicenseClass::BakanlikA1
        )
    }
}

pub const CLASS_B_QUOTA: i64 = 30;
pub const DIFFERENCE_QUOTA: i64 = 15;

/// Per-school candidate counts, one slot per enumerated class. Counts are
/// never negative; decrement clamps at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts([u32; LicenseClass::ALL.len()]);

impl ClassCounts {
    pub fn get(&self, class: LicenseClass) -> u32 {
        self.0[class as usize]
    }

    pub fn set(&mut self, class: LicenseClass, count: u32) {
        self.0[class as usize] = count;
    }

    pub fn increment(&mut self, class: LicenseClass) {
        self.0[class as usize] = self.0[class as usize].saturating_add(1);
    }

    pub fn add(&mut self, class: LicenseClass, n: u32) {
        self.0[class as usize] = self.0[class as usize].saturating_add(n);
    }

    pub fn decrement(&mut self, class: LicenseClass) {
        self.0[class as usize] = self.0[class as usize].saturating_sub(1);
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|&c| c as u64).sum()
    }

    /// Reads a stored code→count map; unknown codes and non-numeric values
    /// are ignored, missing codes count as 0.
    pub fn from_value(value: &Value) -> ClassCounts {
        let mut counts = ClassCounts::default();
        if let Value::Object(map) = value {
            for class in LicenseClass::ALL {
                if let Some(v) = map.get(class.code()) {
                    counts.set(class, value_as_count(v));
                }
            }
        }
        counts
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for class in LicenseClass::ALL {
            map.insert(class.code().to_string(), Value::from(self.get(class)));
        }
        Value::Object(map)
    }
}

fn value_as_count(v: &Value) -> u32 {
    match v {
        Value::Number(n) => {
            let i = n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64);
            i.clamp(0, u32::MAX as i64) as u32
        }
        _ => 0,
    }
}

/// Free-text count input: numbers pass through, numeric strings parse,
/// anything else becomes 0. Always clamped to ≥ 0.
pub fn parse_count_input(value: &Value) -> u32 {
    match value {
        Value::Number(_) => value_as_count(value),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| i.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0),
        _ => 0,
    }
}

/// Global fee table, whole TRY per class. Hardcoded defaults apply until an
/// administrator stores an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeTable([i64; LicenseClass::ALL.len()]);

impl Default for FeeTable {
    fn default() -> FeeTable {
        let mut fees = [0; LicenseClass::ALL.len()];
        for class in LicenseClass::ALL {
            fees[class as usize] = class.default_fee();
        }
        FeeTable(fees)
    }
}

impl FeeTable {
    pub fn get(&self, class: LicenseClass) -> i64 {
        self.0[class as usize]
    }

    pub fn set(&mut self, class: LicenseClass, amount: i64) {
        self.0[class as usize] = amount;
    }

    /// Stored overrides on top of the defaults; absent codes keep their
    /// default amount.
    pub fn from_value(value: &Value) -> FeeTable {
        let mut fees = FeeTable::default();
        if let Value::Object(map) = value {
            for class in LicenseClass::ALL {
                if let Some(amount) = map.get(class.code()).and_then(|v| v.as_i64()) {
                    fees.set(class, amount);
                }
            }
        }
        fees
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for class in LicenseClass::ALL {
            map.insert(class.code().to_string(), Value::from(self.get(class)));
        }
        Value::Object(map)
    }
}

pub fn school_fee_total(counts: &ClassCounts, fees: &FeeTable) -> i64 {
    LicenseClass::ALL
        .iter()
        .map(|&class| counts.get(class) as i64 * fees.get(class))
        .sum()
}

/// Remaining quota; negative means over quota, which is displayed, not an
/// error.
pub fn remaining_b_quota(counts: &ClassCounts) -> i64 {
    CLASS_B_QUOTA - counts.get(LicenseClass::B) as i64
}

pub fn remaining_difference_quota(counts: &ClassCounts) -> i64 {
    let used: i64 = LicenseClass::ALL
        .iter()
        .filter(|c| c.is_difference())
        .map(|&c| counts.get(c) as i64)
        .sum();
    DIFFERENCE_QUOTA - used
}

/// tr-TR currency rendering: thousands grouped with dots, lira sign suffix.
pub fn format_try(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 3);
    let lead = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{grouped} ₺")
    } else {
        format!("{grouped} ₺")
    }
}
