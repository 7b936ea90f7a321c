//! Declarative mapping from vendor telemetry fields to module nodes and
//! driver slots.
//!
//! Discovery and routing both work off this table: a module node exists
//! when all of its defining fields appear in a snapshot, and every entry
//! routes its field independently on each update. The same vendor field
//! may feed more than one entry (the station-status node mirrors the main
//! sensor cluster).

use std::sync::LazyLock;

use super::unit;

/// Indexed add-on sensors (aux temperature/humidity and soil moisture)
/// exist at positions 1..=8 on the vendor side.
pub const INDEXED_SENSOR_COUNT: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    MainStatus,
    BatteryInside,
    BatteryOutside,
    TempOutside,
    TempInside,
    FeelsLikeOutside,
    FeelsLikeInside,
    DewPointOutside,
    DewPointInside,
    HumidityOutside,
    HumidityInside,
    Pressure,
    RainHour,
    RainDay,
    RainWeek,
    RainMonth,
    RainYear,
    RainTotal,
    RainEvent,
    Solar,
    Wind,
    AuxTempHumidity(u8),
    SoilMoisture(u8),
}

impl ModuleKind {
    /// All module kinds in catalog order. Discovery walks this list, so
    /// node creation order (and therefore address assignment) is
    /// deterministic.
    pub fn all() -> Vec<ModuleKind> {
        let mut kinds = vec![
            ModuleKind::MainStatus,
            ModuleKind::BatteryInside,
            ModuleKind::BatteryOutside,
            ModuleKind::TempOutside,
            ModuleKind::TempInside,
            ModuleKind::FeelsLikeOutside,
            ModuleKind::FeelsLikeInside,
            ModuleKind::DewPointOutside,
            ModuleKind::DewPointInside,
            ModuleKind::HumidityOutside,
            ModuleKind::HumidityInside,
            ModuleKind::Pressure,
            ModuleKind::RainHour,
            ModuleKind::RainDay,
            ModuleKind::RainWeek,
            ModuleKind::RainMonth,
            ModuleKind::RainYear,
            ModuleKind::RainTotal,
            ModuleKind::RainEvent,
            ModuleKind::Solar,
            ModuleKind::Wind,
        ];

        for n in 1..=INDEXED_SENSOR_COUNT {
            kinds.push(ModuleKind::AuxTempHumidity(n));
        }
        for n in 1..=INDEXED_SENSOR_COUNT {
            kinds.push(ModuleKind::SoilMoisture(n));
        }

        kinds
    }

    /// Short address suffix appended to the station id. The station-status
    /// node uses the bare station id.
    pub fn address_suffix(&self) -> String {
        match self {
            ModuleKind::MainStatus => String::new(),
            ModuleKind::BatteryInside => "bi".to_owned(),
            ModuleKind::BatteryOutside => "bo".to_owned(),
            ModuleKind::TempOutside => "to".to_owned(),
            ModuleKind::TempInside => "ti".to_owned(),
            ModuleKind::FeelsLikeOutside => "fo".to_owned(),
            ModuleKind::FeelsLikeInside => "fi".to_owned(),
            ModuleKind::DewPointOutside => "do".to_owned(),
            ModuleKind::DewPointInside => "di".to_owned(),
            ModuleKind::HumidityOutside => "ho".to_owned(),
            ModuleKind::HumidityInside => "hi".to_owned(),
            ModuleKind::Pressure => "pr".to_owned(),
            ModuleKind::RainHour => "rh".to_owned(),
            ModuleKind::RainDay => "rd".to_owned(),
            ModuleKind::RainWeek => "rw".to_owned(),
            ModuleKind::RainMonth => "rm".to_owned(),
            ModuleKind::RainYear => "ry".to_owned(),
            ModuleKind::RainTotal => "rt".to_owned(),
            ModuleKind::RainEvent => "re".to_owned(),
            ModuleKind::Solar => "sl".to_owned(),
            ModuleKind::Wind => "wn".to_owned(),
            ModuleKind::AuxTempHumidity(n) => format!("as{}", n),
            ModuleKind::SoilMoisture(n) => format!("sm{}", n),
        }
    }

    /// Display label appended to the station name for the controller UI.
    pub fn label(&self) -> String {
        match self {
            ModuleKind::MainStatus => String::new(),
            ModuleKind::BatteryInside => "Inside Battery".to_owned(),
            ModuleKind::BatteryOutside => "Outside Battery".to_owned(),
            ModuleKind::TempOutside => "Outside Temperature".to_owned(),
            ModuleKind::TempInside => "Inside Temperature".to_owned(),
            ModuleKind::FeelsLikeOutside => "Outside Feels Like".to_owned(),
            ModuleKind::FeelsLikeInside => "Inside Feels Like".to_owned(),
            ModuleKind::DewPointOutside => "Outside Dew Point".to_owned(),
            ModuleKind::DewPointInside => "Inside Dew Point".to_owned(),
            ModuleKind::HumidityOutside => "Outside Humidity".to_owned(),
            ModuleKind::HumidityInside => "Inside Humidity".to_owned(),
            ModuleKind::Pressure => "Barometric Pressure".to_owned(),
            ModuleKind::RainHour => "Rain Hourly".to_owned(),
            ModuleKind::RainDay => "Rain Daily".to_owned(),
            ModuleKind::RainWeek => "Rain Weekly".to_owned(),
            ModuleKind::RainMonth => "Rain Monthly".to_owned(),
            ModuleKind::RainYear => "Rain Yearly".to_owned(),
            ModuleKind::RainTotal => "Rain Total".to_owned(),
            ModuleKind::RainEvent => "Rain Event".to_owned(),
            ModuleKind::Solar => "Solar".to_owned(),
            ModuleKind::Wind => "Wind".to_owned(),
            ModuleKind::AuxTempHumidity(n) => format!("Sensor {}", n),
            ModuleKind::SoilMoisture(n) => format!("Soil Sensor {}", n),
        }
    }

    /// Vendor fields that must ALL be present in a snapshot before this
    /// module is considered to exist. An empty list means the module is
    /// created for every station (the station-status node).
    pub fn defining_fields(&self) -> Vec<String> {
        match self {
            ModuleKind::MainStatus => vec![],
            ModuleKind::BatteryInside => vec!["battin".to_owned()],
            ModuleKind::BatteryOutside => vec!["battout".to_owned()],
            ModuleKind::TempOutside => vec!["tempf".to_owned()],
            ModuleKind::TempInside => vec!["tempinf".to_owned()],
            ModuleKind::FeelsLikeOutside => vec!["feelsLike".to_owned()],
            ModuleKind::FeelsLikeInside => vec!["feelsLikein".to_owned()],
            ModuleKind::DewPointOutside => vec!["dewPoint".to_owned()],
            ModuleKind::DewPointInside => vec!["dewPointin".to_owned()],
            ModuleKind::HumidityOutside => vec!["humidity".to_owned()],
            ModuleKind::HumidityInside => vec!["humidityin".to_owned()],
            //absolute and relative barometer readings always ship together
            ModuleKind::Pressure => vec!["baromabsin".to_owned(), "baromrelin".to_owned()],
            ModuleKind::RainHour => vec!["hourlyrainin".to_owned()],
            ModuleKind::RainDay => vec!["dailyrainin".to_owned()],
            ModuleKind::RainWeek => vec!["weeklyrainin".to_owned()],
            ModuleKind::RainMonth => vec!["monthlyrainin".to_owned()],
            ModuleKind::RainYear => vec!["yearlyrainin".to_owned()],
            ModuleKind::RainTotal => vec!["totalrainin".to_owned()],
            ModuleKind::RainEvent => vec!["eventrainin".to_owned()],
            ModuleKind::Solar => vec!["uv".to_owned(), "solarradiation".to_owned()],
            ModuleKind::Wind => vec!["winddir".to_owned()],
            ModuleKind::AuxTempHumidity(n) => vec![aux_temp_field(*n)],
            ModuleKind::SoilMoisture(n) => vec![soil_humidity_field(*n)],
        }
    }
}

pub fn aux_temp_field(n: u8) -> String {
    format!("temp{}f", n)
}

pub fn soil_humidity_field(n: u8) -> String {
    format!("soilhum{}", n)
}

pub fn soil_temp_field(n: u8) -> String {
    format!("soiltemp{}", n)
}

/// Derived-value rules. Conversions always read the raw vendor field of
/// their own entry, never a previously stored slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Illuminance,
    CompassSector,
}

impl Conversion {
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Conversion::Illuminance => unit::illuminance_from_irradiance(raw),
            Conversion::CompassSector => unit::compass_sector_16(raw) as f64,
        }
    }
}

/// Some indexed vendor fields (`batt3`, `feelsLike3`, `dewPoint3`) do not
/// say whether they belong to the aux sensor or the soil sensor at that
/// index. Guarded entries are resolved against sibling fields in the
/// current snapshot; see the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldContext {
    Unconditional,
    AuxSensor(u8),
    SoilSensor(u8),
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub field: String,
    pub kind: ModuleKind,
    pub slot: &'static str,
    pub convert: Option<Conversion>,
    pub context: FieldContext,
}

impl CatalogEntry {
    fn new(field: &str, kind: ModuleKind, slot: &'static str) -> Self {
        Self {
            field: field.to_owned(),
            kind,
            slot,
            convert: None,
            context: FieldContext::Unconditional,
        }
    }

    fn converted(field: &str, kind: ModuleKind, slot: &'static str, convert: Conversion) -> Self {
        Self {
            convert: Some(convert),
            ..Self::new(field, kind, slot)
        }
    }

    fn guarded(field: String, kind: ModuleKind, slot: &'static str, context: FieldContext) -> Self {
        Self {
            field,
            kind,
            slot,
            convert: None,
            context,
        }
    }
}

/// The routing table, in application order.
pub fn entries() -> &'static [CatalogEntry] {
    CATALOG.as_slice()
}

static CATALOG: LazyLock<Vec<CatalogEntry>> = LazyLock::new(|| {
    use Conversion::*;
    use ModuleKind::*;

    let mut entries = vec![
        //station-status node: the full main sensor cluster, driver names
        //from the controller profile
        CatalogEntry::new("tempf", MainStatus, "CLITEMP"),
        CatalogEntry::new("tempinf", MainStatus, "GV1"),
        CatalogEntry::new("humidity", MainStatus, "CLIHUM"),
        CatalogEntry::new("humidityin", MainStatus, "GV3"),
        CatalogEntry::new("baromrelin", MainStatus, "BARPRES"),
        CatalogEntry::new("baromabsin", MainStatus, "ATMPRES"),
        CatalogEntry::converted("solarradiation", MainStatus, "LUMIN", Illuminance),
        CatalogEntry::new("uv", MainStatus, "UV"),
        CatalogEntry::new("solarradiation", MainStatus, "SOLRAD"),
        CatalogEntry::new("hourlyrainin", MainStatus, "GV9"),
        CatalogEntry::new("dailyrainin", MainStatus, "GV10"),
        CatalogEntry::new("weeklyrainin", MainStatus, "GV11"),
        CatalogEntry::new("monthlyrainin", MainStatus, "GV12"),
        CatalogEntry::new("yearlyrainin", MainStatus, "GV13"),
        CatalogEntry::new("totalrainin", MainStatus, "GV14"),
        CatalogEntry::new("winddir", MainStatus, "WINDDIR"),
        CatalogEntry::converted("winddir", MainStatus, "GV16", CompassSector),
        CatalogEntry::new("windspeedmph", MainStatus, "SPEED"),
        CatalogEntry::new("windgustmph", MainStatus, "GV17"),
        CatalogEntry::new("maxdailygust", MainStatus, "GV18"),
        CatalogEntry::new("feelsLike", MainStatus, "GV19"),
        CatalogEntry::new("dewPoint", MainStatus, "GV20"),
        //single-value module nodes report on ST
        CatalogEntry::new("battin", BatteryInside, "ST"),
        CatalogEntry::new("battout", BatteryOutside, "ST"),
        CatalogEntry::new("tempf", TempOutside, "ST"),
        CatalogEntry::new("tempinf", TempInside, "ST"),
        CatalogEntry::new("feelsLike", FeelsLikeOutside, "ST"),
        CatalogEntry::new("feelsLikein", FeelsLikeInside, "ST"),
        CatalogEntry::new("dewPoint", DewPointOutside, "ST"),
        CatalogEntry::new("dewPointin", DewPointInside, "ST"),
        CatalogEntry::new("humidity", HumidityOutside, "ST"),
        CatalogEntry::new("humidityin", HumidityInside, "ST"),
        CatalogEntry::new("baromrelin", Pressure, "ST"),
        CatalogEntry::new("baromabsin", Pressure, "GV0"),
        CatalogEntry::new("hourlyrainin", RainHour, "ST"),
        CatalogEntry::new("dailyrainin", RainDay, "ST"),
        CatalogEntry::new("weeklyrainin", RainWeek, "ST"),
        CatalogEntry::new("monthlyrainin", RainMonth, "ST"),
        CatalogEntry::new("yearlyrainin", RainYear, "ST"),
        CatalogEntry::new("totalrainin", RainTotal, "ST"),
        CatalogEntry::new("eventrainin", RainEvent, "ST"),
        CatalogEntry::new("solarradiation", Solar, "ST"),
        CatalogEntry::new("uv", Solar, "GV0"),
        CatalogEntry::converted("solarradiation", Solar, "GV1", Illuminance),
        CatalogEntry::new("windspeedmph", Wind, "ST"),
        CatalogEntry::new("winddir", Wind, "GV0"),
        CatalogEntry::converted("winddir", Wind, "GV1", CompassSector),
        CatalogEntry::new("windgustmph", Wind, "GV2"),
        CatalogEntry::new("maxdailygust", Wind, "GV3"),
    ];

    for n in 1..=INDEXED_SENSOR_COUNT {
        entries.push(CatalogEntry::new(&aux_temp_field(n), AuxTempHumidity(n), "ST"));
        entries.push(CatalogEntry::new(&format!("humidity{}", n), AuxTempHumidity(n), "GV0"));
        entries.push(CatalogEntry::guarded(
            format!("batt{}", n),
            AuxTempHumidity(n),
            "GV1",
            FieldContext::AuxSensor(n),
        ));
        entries.push(CatalogEntry::guarded(
            format!("feelsLike{}", n),
            AuxTempHumidity(n),
            "GV2",
            FieldContext::AuxSensor(n),
        ));
        entries.push(CatalogEntry::guarded(
            format!("dewPoint{}", n),
            AuxTempHumidity(n),
            "GV3",
            FieldContext::AuxSensor(n),
        ));
    }

    for n in 1..=INDEXED_SENSOR_COUNT {
        entries.push(CatalogEntry::new(&soil_humidity_field(n), SoilMoisture(n), "ST"));
        entries.push(CatalogEntry::new(&soil_temp_field(n), SoilMoisture(n), "GV0"));
        entries.push(CatalogEntry::guarded(
            format!("batt{}", n),
            SoilMoisture(n),
            "GV1",
            FieldContext::SoilSensor(n),
        ));
    }

    entries
});
