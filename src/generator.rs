//! Typed value generators behind `<<type>>` placeholders.
//!
//! Each generator declares the JSON kind it produces, which is also the kind
//! a request value must have to satisfy the same placeholder. Names are
//! matched case-insensitively. Unknown names fall back to a plain word
//! generator when synthesizing and accept any non-null value when validating.

use crate::template::JsonKind;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type GenerateFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// A zero-argument value producer together with its output kind.
#[derive(Clone)]
pub struct Generator {
    kind: JsonKind,
    generate: GenerateFn,
}

impl Generator {
    pub fn new<F>(kind: JsonKind, generate: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            kind,
            generate: Arc::new(generate),
        }
    }

    pub fn kind(&self) -> JsonKind {
        self.kind
    }

    pub fn generate(&self) -> Value {
        (self.generate)()
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").field("kind", &self.kind).finish()
    }
}

/// Mapping from placeholder type name to generator.
#[derive(Debug, Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Generator>,
    fallback: Generator,
}

impl GeneratorRegistry {
    /// A registry with no named generators; everything uses the fallback.
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
            fallback: Generator::new(JsonKind::String, fake_word),
        }
    }

    /// Register or replace a generator.
    pub fn register<F>(&mut self, name: &str, kind: JsonKind, generate: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.generators
            .insert(name.to_ascii_lowercase(), Generator::new(kind, generate));
    }

    pub fn lookup(&self, name: &str) -> Option<&Generator> {
        self.generators.get(&name.to_ascii_lowercase())
    }

    /// The generator for `name`, or the fallback for unknown names.
    pub fn get(&self, name: &str) -> &Generator {
        self.lookup(name).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Kind a request value must have to satisfy `<<name>>`.
    pub fn expected_kind(&self, name: &str) -> JsonKind {
        self.lookup(name)
            .map(Generator::kind)
            .unwrap_or(JsonKind::Any)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.generators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("firstname", JsonKind::String, || pick(FIRST_NAMES));
        registry.register("lastname", JsonKind::String, || pick(LAST_NAMES));
        registry.register("gender", JsonKind::String, || pick(&["female", "male"]));
        registry.register("email", JsonKind::String, fake_email);
        registry.register("phone", JsonKind::String, fake_phone);
        registry.register("age", JsonKind::Number, || {
            json!(rand::thread_rng().gen_range(18..=80))
        });
        registry.register("country", JsonKind::String, || pick(COUNTRIES));
        registry.register("city", JsonKind::String, || pick(CITIES));
        registry.register("street", JsonKind::String, fake_street);
        registry.register("date", JsonKind::String, fake_recent_date);
        registry.register("sentence", JsonKind::String, || json!(sentence()));
        registry.register("paragraph", JsonKind::String, fake_paragraph);
        registry.register("url", JsonKind::String, fake_url);
        registry.register("word", JsonKind::String, fake_word);
        registry.register("string", JsonKind::String, fake_word);
        registry.register("number", JsonKind::Number, || {
            json!(rand::thread_rng().gen_range(0..=MAX_SAFE_INTEGER))
        });
        registry.register("boolean", JsonKind::Boolean, || {
            json!(rand::thread_rng().gen::<bool>())
        });
        registry.register("httpstatuscode", JsonKind::Number, || {
            let mut rng = rand::thread_rng();
            json!(HTTP_STATUS_CODES.choose(&mut rng).copied().unwrap_or(200))
        });
        registry.register("jwt", JsonKind::String, fake_jwt);
        registry.register("uuid", JsonKind::String, || {
            json!(uuid::Uuid::new_v4().to_string())
        });
        registry
    }
}

/// Largest integer a JavaScript client can represent exactly.
const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Grace", "Linus", "Margaret", "Dennis", "Barbara", "Ken", "Frances", "Edsger",
    "Radia", "Donald", "Hedy", "Niklaus", "Karen", "John",
];

const LAST_NAMES: &[&str] = &[
    "Lovelace", "Turing", "Hopper", "Torvalds", "Hamilton", "Ritchie", "Liskov", "Thompson",
    "Allen", "Dijkstra", "Perlman", "Knuth", "Lamarr", "Wirth", "Jones", "Backus",
];

const COUNTRIES: &[&str] = &[
    "Argentina", "Australia", "Brazil", "Canada", "Denmark", "Egypt", "France", "Germany",
    "India", "Japan", "Kenya", "Mexico", "Norway", "Portugal", "Spain", "Vietnam",
];

const CITIES: &[&str] = &[
    "Lisbon", "Oslo", "Nairobi", "Osaka", "Toronto", "Lyon", "Porto", "Hamburg", "Cairo",
    "Melbourne", "Recife", "Pune", "Hanoi", "Seville", "Bergen", "Monterrey",
];

const STREET_NAMES: &[&str] = &[
    "Maple", "Oak", "Cedar", "Harbor", "Mill", "Church", "Station", "Park", "Lake", "Hill",
];

const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Lane", "Way", "Court"];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "mail.test", "inbox.dev"];

const TLDS: &[&str] = &["com", "org", "net", "io", "dev"];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "dolore", "magna", "aliqua", "enim", "minim",
    "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip",
    "commodo", "consequat", "aute", "irure", "voluptate",
];

const HTTP_STATUS_CODES: &[u16] = &[
    200, 201, 202, 204, 301, 302, 304, 400, 401, 403, 404, 409, 422, 429, 500, 502, 503, 504,
];

fn pick(choices: &[&str]) -> Value {
    let mut rng = rand::thread_rng();
    json!(choices.choose(&mut rng).copied().unwrap_or_default())
}

fn word() -> &'static str {
    let mut rng = rand::thread_rng();
    LOREM.choose(&mut rng).copied().unwrap_or("lorem")
}

fn fake_word() -> Value {
    json!(word())
}

fn sentence() -> String {
    let len = rand::thread_rng().gen_range(4..=10);
    let words: Vec<&str> = (0..len).map(|_| word()).collect();
    let joined = words.join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn fake_paragraph() -> Value {
    let count = rand::thread_rng().gen_range(3..=6);
    let sentences: Vec<String> = (0..count).map(|_| sentence()).collect();
    json!(sentences.join(" "))
}

fn fake_email() -> Value {
    let mut rng = rand::thread_rng();
    let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("user");
    let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("name");
    let domain = EMAIL_DOMAINS.choose(&mut rng).copied().unwrap_or("example.com");
    json!(format!(
        "{}.{}{}@{}",
        first.to_lowercase(),
        last.to_lowercase(),
        rng.gen_range(1..100),
        domain
    ))
}

fn fake_phone() -> Value {
    let mut rng = rand::thread_rng();
    json!(format!(
        "+1-{:03}-{:03}-{:04}",
        rng.gen_range(200..1000),
        rng.gen_range(0..1000),
        rng.gen_range(0..10000)
    ))
}

fn fake_street() -> Value {
    let mut rng = rand::thread_rng();
    let name = STREET_NAMES.choose(&mut rng).copied().unwrap_or("Main");
    let suffix = STREET_SUFFIXES.choose(&mut rng).copied().unwrap_or("Street");
    json!(format!("{} {} {}", rng.gen_range(1..2000), name, suffix))
}

/// A timestamp within the last day.
fn fake_recent_date() -> Value {
    let seconds_ago = rand::thread_rng().gen_range(0..86_400);
    let when = Utc::now() - Duration::seconds(seconds_ago);
    json!(when.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

fn fake_url() -> Value {
    let mut rng = rand::thread_rng();
    let tld = TLDS.choose(&mut rng).copied().unwrap_or("com");
    json!(format!("https://{}.{}/{}", word(), tld, word()))
}

fn fake_jwt() -> Value {
    let mut rng = rand::thread_rng();
    let header = json!({"alg": "HS256", "typ": "JWT"});
    let payload = json!({
        "sub": uuid::Uuid::new_v4().to_string(),
        "iat": Utc::now().timestamp(),
    });
    let signature: [u8; 32] = rng.gen();
    json!(format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}
