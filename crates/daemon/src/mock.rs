//! Random payloads for the dashboard's read-only endpoints.
//!
//! Every call generates fresh data; nothing is cached or persisted.

use gramseva_core::{new_ulid, now_iso};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::{json, Value};

const VILLAGES: &[&str] = &[
    "Rampur", "Sitapur", "Kheda", "Bhadrak", "Nandgaon", "Karjat", "Malpura", "Dharampur",
];
const CROPS: &[&str] = &["Wheat", "Rice", "Maize", "Cotton", "Sugarcane", "Soybean", "Mustard"];
const WATER_SOURCES: &[&str] = &["Borewell", "Village tank", "Hand pump", "River", "Piped supply"];
const CONDITIONS: &[&str] = &["Sunny", "Partly cloudy", "Cloudy", "Light rain", "Thunderstorm"];
const SEVERITIES: &[&str] = &["low", "medium", "high"];

fn pick(items: &'static [&'static str]) -> &'static str {
    items.choose(&mut rand::rng()).copied().unwrap_or_default()
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn id() -> String {
    new_ulid().to_string()
}

// --- water ---

pub fn water_quality() -> Value {
    let mut rng = rand::rng();
    let readings: Vec<Value> = (0..rng.random_range(4..8))
        .map(|_| {
            let ph = round1(rng.random_range(6.0..9.0));
            let tds = rng.random_range(80..900);
            let turbidity = round1(rng.random_range(0.2..8.0));
            let safe = (6.5..=8.5).contains(&ph) && tds < 500 && turbidity < 5.0;
            json!({
                "id": id(),
                "location": pick(VILLAGES),
                "source": pick(WATER_SOURCES),
                "ph": ph,
                "tds": tds,
                "turbidity": turbidity,
                "chlorine": round2(rng.random_range(0.0..1.5)),
                "status": if safe { "safe" } else { "unsafe" },
                "testedAt": now_iso(),
            })
        })
        .collect();
    Value::Array(readings)
}

pub fn water_quality_trends() -> Value {
    let mut rng = rand::rng();
    let months = ["Jan", "Feb", "Mar", "Apr", "May", "Jun"];
    let points: Vec<Value> = months
        .iter()
        .map(|m| {
            json!({
                "month": m,
                "ph": round1(rng.random_range(6.5..8.5)),
                "tds": rng.random_range(150..600),
                "turbidity": round1(rng.random_range(0.5..6.0)),
            })
        })
        .collect();
    Value::Array(points)
}

pub fn water_stats() -> Value {
    let mut rng = rand::rng();
    let total = rng.random_range(40..120);
    let safe = rng.random_range(total / 2..total);
    json!({
        "totalSources": total,
        "safeSources": safe,
        "unsafeSources": total - safe,
        "householdsCovered": rng.random_range(500..5000),
        "avgDailySupplyLitres": rng.random_range(40..135),
        "openLeakReports": rng.random_range(0..25),
    })
}

pub fn purification_guides() -> Value {
    json!([
        {
            "id": "boiling",
            "title": "Boiling",
            "summary": "Bring water to a rolling boil for at least one minute, then cool covered.",
            "difficulty": "easy",
        },
        {
            "id": "chlorination",
            "title": "Chlorination",
            "summary": "Add two drops of household bleach per litre and wait thirty minutes.",
            "difficulty": "easy",
        },
        {
            "id": "sodis",
            "title": "Solar disinfection",
            "summary": "Fill clear bottles and leave them in full sun for six hours.",
            "difficulty": "easy",
        },
        {
            "id": "sand-filter",
            "title": "Bio-sand filter",
            "summary": "Layered sand and gravel removes sediment and most pathogens.",
            "difficulty": "medium",
        },
    ])
}

// --- farming ---

pub fn farmer_weather() -> Value {
    let mut rng = rand::rng();
    let days: Vec<Value> = (0..7)
        .map(|day| {
            json!({
                "day": day,
                "condition": pick(CONDITIONS),
                "tempMaxC": rng.random_range(26..44),
                "tempMinC": rng.random_range(12..26),
                "rainChance": rng.random_range(0..100),
                "humidity": rng.random_range(20..95),
            })
        })
        .collect();
    json!({ "location": pick(VILLAGES), "forecast": days })
}

pub fn crop_prices() -> Value {
    let mut rng = rand::rng();
    let prices: Vec<Value> = CROPS
        .iter()
        .map(|crop| {
            let price = rng.random_range(1200..7500);
            json!({
                "crop": crop,
                "market": format!("{} mandi", pick(VILLAGES)),
                "pricePerQuintal": price,
                "change": round1(rng.random_range(-6.0..6.0)),
                "msp": price - rng.random_range(0..400),
            })
        })
        .collect();
    Value::Array(prices)
}

pub fn farmer_advisories() -> Value {
    let mut rng = rand::rng();
    let tips = [
        "Irrigate early in the morning to reduce evaporation.",
        "Watch for aphids on mustard; spray neem extract if seen.",
        "Delay urea application until after forecast rain.",
        "Store harvested grain below 12% moisture.",
    ];
    let items: Vec<Value> = tips
        .iter()
        .map(|tip| {
            json!({
                "id": id(),
                "crop": pick(CROPS),
                "advice": tip,
                "severity": pick(SEVERITIES),
                "validDays": rng.random_range(1..10),
            })
        })
        .collect();
    Value::Array(items)
}

pub fn government_schemes() -> Value {
    json!([
        { "id": "pm-kisan", "name": "PM-KISAN", "benefit": "Income support of 6000 per year", "eligibility": "Small and marginal farmers" },
        { "id": "pmfby", "name": "Crop insurance", "benefit": "Insurance against crop loss", "eligibility": "All farmers growing notified crops" },
        { "id": "kcc", "name": "Kisan Credit Card", "benefit": "Short-term crop loans", "eligibility": "Farmers, tenant farmers, share croppers" },
        { "id": "shc", "name": "Soil Health Card", "benefit": "Free soil testing and nutrient advice", "eligibility": "All farmers" },
    ])
}

// --- health ---

pub fn health_stats() -> Value {
    let mut rng = rand::rng();
    json!({
        "vaccinationCoverage": rng.random_range(55..98),
        "activeCases": rng.random_range(0..300),
        "healthWorkers": rng.random_range(3..40),
        "facilities": rng.random_range(1..12),
        "maternalCheckups": rng.random_range(20..400),
        "updatedAt": now_iso(),
    })
}

pub fn health_advisories() -> Value {
    let topics = [
        ("Dengue", "Remove standing water around homes every week."),
        ("Heatwave", "Drink water often and avoid work outdoors at midday."),
        ("Diarrhoea", "Boil drinking water and wash hands before meals."),
        ("Malaria", "Sleep under treated bed nets."),
    ];
    let items: Vec<Value> = topics
        .iter()
        .map(|(title, body)| {
            json!({
                "id": id(),
                "title": title,
                "message": body,
                "severity": pick(SEVERITIES),
                "issuedAt": now_iso(),
            })
        })
        .collect();
    Value::Array(items)
}

/// Facilities near `coords`, or around a random village when none are given.
pub fn health_facilities(location: Option<&str>, coords: Option<(f64, f64)>) -> Value {
    let mut rng = rand::rng();
    let (lat, lng) = coords.unwrap_or((rng.random_range(20.0..28.0), rng.random_range(74.0..86.0)));
    let kinds = ["Primary Health Centre", "Sub Centre", "Community Health Centre", "District Hospital"];
    let items: Vec<Value> = (0..rng.random_range(3..7))
        .map(|_| {
            let village = pick(VILLAGES);
            let kind = kinds.choose(&mut rng).copied().unwrap_or("Sub Centre");
            json!({
                "id": id(),
                "name": format!("{village} {kind}"),
                "type": kind,
                "location": location.filter(|l| !l.is_empty()).unwrap_or(village),
                "lat": lat + rng.random_range(-0.05..0.05),
                "lng": lng + rng.random_range(-0.05..0.05),
                "distanceKm": round1(rng.random_range(0.3..25.0)),
                "open24x7": rng.random_bool(0.3),
            })
        })
        .collect();
    Value::Array(items)
}

/// Rough assessment for a symptom list. Not medical advice.
pub fn symptom_assessment(symptoms: &[String]) -> Value {
    let mut rng = rand::rng();
    let lower: Vec<String> = symptoms.iter().map(|s| s.to_lowercase()).collect();
    let has = |needle: &str| lower.iter().any(|s| s.contains(needle));

    let mut conditions = Vec::new();
    if has("fever") {
        conditions.push("Viral fever");
        if has("joint") || has("rash") {
            conditions.push("Dengue");
        }
        if has("chill") {
            conditions.push("Malaria");
        }
    }
    if has("cough") || has("throat") {
        conditions.push("Respiratory infection");
    }
    if has("diarrh") || has("vomit") || has("stomach") {
        conditions.push("Gastroenteritis");
    }
    if conditions.is_empty() {
        conditions.push("General malaise");
    }

    let severity = match symptoms.len() {
        0..=1 => "low",
        2..=3 => "medium",
        _ => "high",
    };
    let recommendation = match severity {
        "high" => "Visit the nearest health centre today.",
        "medium" => "Rest, drink fluids and see a health worker if it persists beyond two days.",
        _ => "Rest and monitor your symptoms.",
    };

    json!({
        "symptoms": symptoms,
        "possibleConditions": conditions,
        "severity": severity,
        "confidence": round2(rng.random_range(0.55..0.9)),
        "recommendation": recommendation,
        "checkedAt": now_iso(),
    })
}

// --- education, resources, climate, jobs ---

pub fn schools() -> Value {
    let mut rng = rand::rng();
    let items: Vec<Value> = (0..rng.random_range(3..7))
        .map(|_| {
            let students = rng.random_range(60..900);
            json!({
                "id": id(),
                "name": format!("Government School {}", pick(VILLAGES)),
                "students": students,
                "teachers": (students / rng.random_range(25..45)).max(1),
                "hasDigitalClassroom": rng.random_bool(0.4),
                "midDayMeal": rng.random_bool(0.9),
            })
        })
        .collect();
    Value::Array(items)
}

pub fn scholarships() -> Value {
    json!([
        { "id": "pre-matric", "name": "Pre-matric scholarship", "amount": 3500, "eligibility": "Classes 1 to 10" },
        { "id": "post-matric", "name": "Post-matric scholarship", "amount": 12000, "eligibility": "Class 11 and above" },
        { "id": "girls-incentive", "name": "Girl child incentive", "amount": 3000, "eligibility": "Girls enrolling in class 9" },
    ])
}

pub fn forest_cover() -> Value {
    let mut rng = rand::rng();
    let years: Vec<Value> = (2019..=2025)
        .map(|year| {
            json!({
                "year": year,
                "coverPercent": round1(rng.random_range(18.0..34.0)),
                "treesPlanted": rng.random_range(500..20000),
            })
        })
        .collect();
    Value::Array(years)
}

pub fn groundwater() -> Value {
    let mut rng = rand::rng();
    let wells: Vec<Value> = (0..rng.random_range(3..8))
        .map(|_| {
            let depth = round1(rng.random_range(4.0..60.0));
            json!({
                "id": id(),
                "village": pick(VILLAGES),
                "depthMetres": depth,
                "status": if depth > 40.0 { "critical" } else if depth > 20.0 { "semi-critical" } else { "safe" },
                "measuredAt": now_iso(),
            })
        })
        .collect();
    Value::Array(wells)
}

pub fn climate_forecast() -> Value {
    let mut rng = rand::rng();
    json!({
        "location": pick(VILLAGES),
        "condition": pick(CONDITIONS),
        "temperatureC": rng.random_range(14..45),
        "humidity": rng.random_range(15..95),
        "windKph": rng.random_range(0..40),
        "rainfallMm": round1(rng.random_range(0.0..60.0)),
        "aqi": rng.random_range(30..320),
        "observedAt": now_iso(),
    })
}

pub fn climate_alerts() -> Value {
    let mut rng = rand::rng();
    let kinds = ["Heatwave", "Heavy rain", "Hailstorm", "Dry spell", "Cold wave"];
    let items: Vec<Value> = (0..rng.random_range(0..4))
        .map(|_| {
            json!({
                "id": id(),
                "kind": kinds.choose(&mut rng).copied().unwrap_or("Heatwave"),
                "area": pick(VILLAGES),
                "severity": pick(SEVERITIES),
                "validHours": rng.random_range(6..72),
            })
        })
        .collect();
    Value::Array(items)
}

pub fn job_listings() -> Value {
    let mut rng = rand::rng();
    let roles = [
        "MGNREGA worksite labour",
        "Anganwadi helper",
        "Tailoring unit operator",
        "Dairy cooperative collector",
        "Solar pump technician",
    ];
    let items: Vec<Value> = roles
        .iter()
        .map(|role| {
            json!({
                "id": id(),
                "title": role,
                "village": pick(VILLAGES),
                "dailyWage": rng.random_range(250..700),
                "openings": rng.random_range(1..30),
                "womenPreferred": rng.random_bool(0.4),
            })
        })
        .collect();
    Value::Array(items)
}

pub fn training_programs() -> Value {
    json!([
        { "id": "tailoring", "name": "Tailoring and garment making", "weeks": 8, "stipend": 1500 },
        { "id": "solar", "name": "Solar equipment maintenance", "weeks": 6, "stipend": 2000 },
        { "id": "digital", "name": "Digital literacy", "weeks": 4, "stipend": 0 },
        { "id": "dairy", "name": "Dairy and animal husbandry", "weeks": 5, "stipend": 1000 },
    ])
}

pub fn gender_stats() -> Value {
    let mut rng = rand::rng();
    json!({
        "femaleLiteracyPercent": round1(rng.random_range(45.0..85.0)),
        "womenInWorkforcePercent": round1(rng.random_range(15.0..45.0)),
        "selfHelpGroups": rng.random_range(5..120),
        "womenLedEnterprises": rng.random_range(0..60),
        "sexRatio": rng.random_range(880..1010),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_quality_status_matches_readings() {
        let readings = water_quality();
        for r in readings.as_array().unwrap() {
            let ph = r["ph"].as_f64().unwrap();
            let tds = r["tds"].as_i64().unwrap();
            let turbidity = r["turbidity"].as_f64().unwrap();
            let safe = (6.5..=8.5).contains(&ph) && tds < 500 && turbidity < 5.0;
            assert_eq!(r["status"], if safe { "safe" } else { "unsafe" });
        }
    }

    #[test]
    fn facilities_use_requested_location() {
        let facilities = health_facilities(Some("Main St"), Some((21.0, 79.0)));
        for f in facilities.as_array().unwrap() {
            assert_eq!(f["location"], "Main St");
            assert!((f["lat"].as_f64().unwrap() - 21.0).abs() < 0.1);
        }
    }

    #[test]
    fn symptom_assessment_flags_dengue_pattern() {
        let result = symptom_assessment(&["Fever".into(), "joint pain".into(), "rash".into()]);
        let conditions = result["possibleConditions"].as_array().unwrap();
        assert!(conditions.iter().any(|c| c == "Dengue"));
        assert_eq!(result["severity"], "medium");
    }

    #[test]
    fn empty_symptoms_are_low_severity() {
        let result = symptom_assessment(&[]);
        assert_eq!(result["severity"], "low");
        assert_eq!(result["possibleConditions"][0], "General malaise");
    }
}
