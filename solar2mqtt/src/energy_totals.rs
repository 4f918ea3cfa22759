/// The three energy metrics published by this crate, in publish order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    SolarTotal,
    GridImport,
    GridExport,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::SolarTotal, Metric::GridImport, Metric::GridExport];

    /// Machine readable identifier, used in topics and unique ids.
    pub fn slug(self) -> &'static str {
        match self {
            Metric::SolarTotal => "solar_total",
            Metric::GridImport => "grid_import",
            Metric::GridExport => "grid_export",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Metric::SolarTotal => "Solar Energy Total",
            Metric::GridImport => "Grid Import Total",
            Metric::GridExport => "Grid Export Total",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Metric::SolarTotal => "mdi:solar-power",
            Metric::GridImport => "mdi:transmission-tower-import",
            Metric::GridExport => "mdi:transmission-tower-export",
        }
    }
}

/// Totals extracted from one API document, all in kWh.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergyTotals {
    pub solar_total_kwh: f64,
    pub grid_import_kwh: f64,
    pub grid_export_kwh: f64,
}

impl EnergyTotals {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SolarTotal => self.solar_total_kwh,
            Metric::GridImport => self.grid_import_kwh,
            Metric::GridExport => self.grid_export_kwh,
        }
    }

    /// Yields every metric with its value, solar first, then import, then export.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL
            .into_iter()
            .map(move |metric| (metric, self.get(metric)))
    }
}

impl std::fmt::Display for EnergyTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "solar={:.3} grid_import={:.3} grid_export={:.3}",
            self.solar_total_kwh, self.grid_import_kwh, self.grid_export_kwh
        )
    }
}
