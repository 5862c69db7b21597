/// Naming for one observable quantity across the console surfaces.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub metric: &'static str,
    pub unit: &'static str,
}

pub const RPM: Tag = Tag {
    metric: "thrustbench_thruster_rpm",
    unit: "rpm",
};

pub const VOLTAGE: Tag = Tag {
    metric: "thrustbench_supply_voltage_volts",
    unit: "V",
};

pub const CURRENT: Tag = Tag {
    metric: "thrustbench_supply_current_amps",
    unit: "A",
};

pub const FORCE: Tag = Tag {
    metric: "thrustbench_thrust_force",
    unit: "kgf",
};

pub const POWER_CONNECTED: Tag = Tag {
    metric: "thrustbench_power_connected",
    unit: "",
};

pub const FORCE_CONNECTED: Tag = Tag {
    metric: "thrustbench_force_connected",
    unit: "",
};

pub const THRUSTER_RUNNING: Tag = Tag {
    metric: "thrustbench_thruster_running",
    unit: "",
};

pub const TEST_RUNNING: Tag = Tag {
    metric: "thrustbench_test_running",
    unit: "",
};
