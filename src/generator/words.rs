//! Word tables for generated text.

pub const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Amara", "Bea", "Carlos", "Chen", "Dana", "Elena", "Farah", "Felix", "Grace", "Hiro", "Ines",
    "Jonas", "Kofi", "Lena", "Lucas", "Maya", "Mateo", "Nia", "Omar", "Priya", "Quinn", "Rosa", "Sam", "Sofia",
    "Tariq", "Uma", "Victor", "Wen", "Yara", "Zoe",
];

pub const LAST_NAMES: &[&str] = &[
    "Adams", "Bauer", "Costa", "Dubois", "Eriksen", "Fischer", "Garcia", "Hughes", "Ito", "Jensen", "Kowalski",
    "Lopez", "Martin", "Nakamura", "Okafor", "Patel", "Rossi", "Santos", "Schmidt", "Silva", "Tanaka", "Turner",
    "Varga", "Walker", "Young", "Zhang",
];

pub const CITIES: &[&str] = &[
    "Amsterdam", "Austin", "Barcelona", "Berlin", "Bristol", "Chicago", "Dublin", "Lisbon", "Lyon", "Madrid",
    "Melbourne", "Milan", "Montreal", "Mumbai", "Osaka", "Paris", "Portland", "Rotterdam", "Sao Paulo", "Seattle",
    "Sydney", "Tokyo", "Toronto", "Vancouver",
];

pub const COMPANY_PREFIXES: &[&str] = &[
    "Acme", "Blue", "Bright", "Cedar", "Copper", "Delta", "Granite", "Harbor", "Lumen", "Maple", "Nimbus", "North",
    "Orbit", "Pioneer", "Silver", "Summit",
];

pub const COMPANY_SUFFIXES: &[&str] = &[
    "Labs", "Works", "Supply", "Trading", "Goods", "Studio", "Outfitters", "Industries", "Collective", "Co",
];

pub const COLORS: &[&str] = &[
    "Black", "White", "Red", "Blue", "Green", "Yellow", "Orange", "Purple", "Grey", "Navy", "Teal", "Beige",
];

pub const SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL"];

pub const ADJECTIVES: &[&str] = &[
    "Classic", "Compact", "Deluxe", "Durable", "Ergonomic", "Handmade", "Lightweight", "Modern", "Portable",
    "Premium", "Rustic", "Sleek", "Sturdy", "Vintage", "Wireless",
];

pub const PRODUCTS: &[&str] = &[
    "Backpack", "Bicycle", "Blender", "Camera", "Chair", "Desk", "Drone", "Guitar", "Headphones", "Jacket", "Kayak",
    "Lamp", "Mug", "Projector", "Scooter", "Speaker", "Tent", "Watch",
];

pub const STREETS: &[&str] = &[
    "Oak Street", "Maple Avenue", "High Street", "Station Road", "Park Lane", "Harbour Way", "Mill Road",
    "Church Street", "Elm Drive", "King Street",
];

pub const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.example.com"];

pub const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do", "eiusmod", "tempor",
    "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim", "minim", "veniam", "quis", "nostrud",
];
