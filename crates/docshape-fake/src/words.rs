pub(crate) const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Carol", "David", "Eve", "Frank", "Grace", "Hank", "Iris", "Jack", "Karen",
    "Leo", "Mona", "Nate", "Olivia", "Paul", "Quinn", "Rita", "Sam", "Tina", "Uma", "Victor",
    "Wendy", "Xavier", "Yara", "Zane", "Amelia", "Bruno", "Chloe", "Diego", "Elena", "Felix",
    "Gemma", "Hugo", "Ingrid", "Jonas", "Kira", "Lars", "Maya", "Nico",
];

pub(crate) const LAST_NAMES: &[&str] = &[
    "Johnson",
    "Smith",
    "Williams",
    "Brown",
    "Jones",
    "Garcia",
    "Miller",
    "Davis",
    "Rodriguez",
    "Martinez",
    "Anderson",
    "Taylor",
    "Thomas",
    "Moore",
    "Jackson",
    "White",
    "Harris",
    "Clark",
    "Lewis",
    "Young",
    "Walker",
    "Hall",
    "Allen",
    "King",
    "Wright",
    "Scott",
    "Green",
    "Baker",
    "Adams",
    "Nelson",
    "Hill",
    "Campbell",
    "Mitchell",
    "Roberts",
    "Carter",
    "Phillips",
    "Evans",
    "Turner",
    "Torres",
    "Parker",
];

pub(crate) const COMPANY_SUFFIXES: &[&str] = &["Inc", "LLC", "Group", "PLC", "Ltd", "and Sons"];

pub(crate) const STREET_NAMES: &[&str] = &[
    "Oak",
    "Maple",
    "Cedar",
    "Pine",
    "Elm",
    "Washington",
    "Lake",
    "Hill",
    "Park",
    "Sunset",
    "River",
    "Church",
    "Mill",
    "Spring",
    "Highland",
    "Forest",
];

pub(crate) const STREET_SUFFIXES: &[&str] = &[
    "Street",
    "Avenue",
    "Road",
    "Lane",
    "Drive",
    "Court",
    "Way",
    "Boulevard",
];

pub(crate) const CITIES: &[&str] = &[
    "Springfield",
    "Riverside",
    "Franklin",
    "Greenville",
    "Bristol",
    "Clinton",
    "Fairview",
    "Salem",
    "Madison",
    "Georgetown",
    "Arlington",
    "Ashland",
];

pub(crate) const STATES: &[&str] = &[
    "AL", "AK", "AZ", "CA", "CO", "CT", "FL", "GA", "IL", "MA", "MI", "MN", "NY", "OH", "OR", "PA",
    "TX", "VA", "WA", "WI",
];
