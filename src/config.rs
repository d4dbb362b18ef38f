/// Fixed deployment roster: the five schools served by this installation.
/// Ids are stable and referenced by stored data; never renumber.
pub const PREDEFINED_SCHOOLS: [(&str, &str, &str); 5] = [
    ("1", "ÖZEL BİGA LİDER MTSK", "bigalidermtsk@biga.com"),
    ("2", "ÖZEL BİGA IŞIKLAR MTSK", "bigaisiklarmtsk@biga.com"),
    ("3", "ÖZEL BİGA GÖZDE MTSK", "bigagozdemtsk@biga.com"),
    ("4", "ÖZEL BİGA MARMARA MTSK", "bigamarmaramtsk@biga.com"),
    ("5", "ÖZEL BİGA TEKSÜR MTSK", "bigateksurmtsk@biga.com"),
];

pub const ADMIN_EMAIL: &str = "admin@surucukursu.com";

/// Month keys used throughout stored paths and registration records.
pub const MONTHS: [&str; 12] = [
    "Ocak", "Şubat", "Mart", "Nisan", "Mayıs", "Haziran", "Temmuz", "Ağustos", "Eylül", "Ekim",
    "Kasım", "Aralık",
];

pub fn is_month(name: &str) -> bool {
    MONTHS.contains(&name)
}

pub const MIN_PASSWORD_LEN: usize = 6;
