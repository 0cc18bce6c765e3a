use crate::Kinetics::kinetic_model::{KineticModel, Trajectory};
use crate::Kinetics::mechanisms::ReactionScheme;
use prettytable::{Cell, Row, Table, row};

impl Trajectory {
    pub fn pretty_print(&self) {
        let mut table = Table::new();
        let mut header = vec!["t".to_string()];
        header.extend(self.species.iter().map(|s| s.name().to_string()));
        header.push("X, %".to_string());
        table.add_row(Row::new(header.iter().map(|h| Cell::new(h)).collect()));
        for (i, t) in self.time.iter().enumerate() {
            let mut cells = vec![format!("{:.2}", t)];
            cells.extend(self.concentrations[i].iter().map(|c| format!("{:.5}", c)));
            cells.push(format!("{:.3}", self.conversion[i]));
            table.add_row(Row::new(cells.iter().map(|c| Cell::new(c)).collect()));
        }
        println!("Trajectory at {} °C", self.temperature);
        table.printstd();
        println!(
            "{}: {} mesh points, steps from {:.3e} to {:.3e}",
            self.stats.method, self.stats.mesh_points, self.stats.smallest_step, self.stats.largest_step
        );
    }
}

impl KineticModel {
    /// Arrhenius parameters and, when `temperature` is given, the rate constants at that temperature
    pub fn pretty_print(&self, temperature: Option<f64>) {
        let mut table = Table::new();
        table.add_row(row!["Rate constant", "A", "Ea, kJ/mol", "k(T)"]);
        let r = self.gas_constant();
        for (label, pair) in self.step_labels().iter().zip(self.parameters().pairs()) {
            let k = match temperature {
                Some(t) => format!("{:.4e}", pair.rate_constant(t, r)),
                None => "-".to_string(),
            };
            table.add_row(row![
                label,
                format!("{:.4e}", pair.A),
                format!("{:.3}", pair.Ea),
                k
            ]);
        }
        println!(
            "Mechanism: {} ({:?})",
            self.mechanism().name(),
            self.reversibility()
        );
        table.printstd();
    }

    pub fn pretty_print_equations(&self) {
        let mut table = Table::new();
        table.add_row(row!["Variable", "d/dt"]);
        for (name, expr) in self.symbolic_equations() {
            table.add_row(row![name, format!("{}", expr)]);
        }
        for (name, expr) in self.symbolic_rate_constants() {
            table.add_row(row![name, format!("{}", expr)]);
        }
        table.printstd();
    }
}
