use std::sync::{Arc, Mutex, RwLock};

use common::node::{Node, NodeConfig};
use common::robot::Pose2;
use graphics::primitiverenderer::{Color, PrimitiveType};
use egui::Slider;
use nalgebra::{Point2, Vector2};
use pubsub::Publisher;
use serde::Deserialize;
use slam::SensorPolar2D;
use simulator_loop::SimulatorLoop;

use scene::ray::{Draw, LineSegment, Scene};
use sim::{SimParameters, Simulator};

mod scene;
mod sim;

pub struct SimulatorNode {
    scene: Arc<RwLock<Scene>>,
    simulator: Arc<Mutex<Simulator>>,
    simulator_loop: SimulatorLoop,
    running: bool,
    draw_scene: bool,
    draw_pose: bool,
}

#[derive(Clone, Deserialize)]
pub struct SimulatorNodeConfig {
    topic_scan: String,
    running: bool,

    #[serde(default)]
    scene: Vec<SceneObject>,

    #[serde(default = "default_true")]
    draw_scene: bool,
    #[serde(default = "default_true")]
    draw_pose: bool,

    parameters: SimParameters,
}

const fn default_true() -> bool {
    true
}

#[derive(Clone, Deserialize)]
enum SceneObject {
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
    Rectangle { x: f32, y: f32, width: f32, height: f32 },
}

impl NodeConfig for SimulatorNodeConfig {
    fn instantiate(&self, pubsub: &mut pubsub::PubSub) -> Box<dyn Node> {
        let mut scene = Scene::new();
        for o in &self.scene {
            match *o {
                SceneObject::Line { x1, y1, x2, y2 } => {
                    scene.add(Box::new(LineSegment::new(x1, y1, x2, y2)));
                }
                SceneObject::Rectangle { x, y, width, height } => {
                    scene.add_rect(Point2::new(x, y), Vector2::new(width, height));
                }
            }
        }

        let scene = Arc::new(RwLock::new(scene));
        let pub_scan: Publisher<(SensorPolar2D, Pose2)> = pubsub.publish(&self.topic_scan);
        let simulator = Arc::new(Mutex::new(Simulator::new(scene.clone(), self.parameters)));

        Box::new(SimulatorNode {
            scene,
            running: self.running,
            simulator: simulator.clone(),
            simulator_loop: SimulatorLoop::new(simulator, pub_scan),
            draw_scene: self.draw_scene,
            draw_pose: self.draw_pose,
        })
    }
}

impl Node for SimulatorNode {
    fn update(&mut self) {
        self.simulator_loop.tick(self.running);
    }

    fn draw(&mut self, ui: &egui::Ui, world: &mut common::world::WorldObj<'_>) {
        egui::Window::new("Simulator").show(ui.ctx(), |ui| {
            ui.label("Used to simulate different LIDAR sensors and environment shapes.");

            ui.checkbox(&mut self.running, "Running");
            ui.checkbox(&mut self.draw_scene, "Draw Scene");
            ui.checkbox(&mut self.draw_pose, "Draw Pose");

            {
                let mut simulator = self.simulator.lock().expect("simulator lock poisoned");
                let params = simulator.parameters_mut();
                ui.add(Slider::new(&mut params.update_period, 0.05..=2.0).text("Update Period (s)"));
                ui.add(Slider::new(&mut params.scanner_range, 0.5..=15.0).text("Scanner Range (m)"));
                ui.add(Slider::new(&mut params.path_radius, 0.1..=5.0).text("Path Radius (m)"));
                ui.add(Slider::new(&mut params.path_angular_speed, 0.0..=2.0).text("Path Angular Speed (rad/s)"));
            }
        });

        if self.draw_scene {
            world.sr.begin(PrimitiveType::Line);
            self.scene.read().expect("scene lock poisoned").draw(world.sr, Color::BLACK);
            world.sr.end();
        }

        if self.draw_pose {
            world.sr.begin(PrimitiveType::Filled);
            let pose = self.simulator.lock().expect("simulator lock poisoned").pose();
            world.sr.arrow(pose.x, pose.y, pose.theta, 0.15, Color::BLUE);
            world.sr.end();
        }
    }

    fn terminate(&mut self) {
        self.simulator_loop.tick(false);
    }
}

#[cfg(target_arch = "wasm32")]
mod simulator_loop {
    // Run the simulator directly on the main thread on wasm targets since
    // threading is not available there.
    use std::sync::{Arc, Mutex};

    use common::robot::Pose2;
    use pubsub::Publisher;
    use slam::SensorPolar2D;
    use web_time::Instant;

    use crate::sim::Simulator;

    pub struct SimulatorLoop {
        simulator: Arc<Mutex<Simulator>>,
        pub_scan: Publisher<(SensorPolar2D, Pose2)>,
        accumulator: f64,
        current_time: Instant,
    }

    impl SimulatorLoop {
        pub fn new(simulator: Arc<Mutex<Simulator>>, pub_scan: Publisher<(SensorPolar2D, Pose2)>) -> Self {
            Self {
                simulator,
                pub_scan,
                accumulator: 0.0,
                current_time: Instant::now(),
            }
        }

        pub fn tick(&mut self, running: bool) {
            if !running {
                return;
            }

            let dt = 1.0 / 30.0;

            let new_time = Instant::now();
            let frame_time = new_time - self.current_time;
            self.current_time = new_time;

            self.accumulator += frame_time.as_secs_f64();

            while self.accumulator >= dt {
                if let Some(output) = self.simulator.lock().expect("simulator lock poisoned").tick(dt as f32) {
                    self.pub_scan.publish(std::sync::Arc::new(output));
                }
                self.accumulator -= dt;
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod simulator_loop {
    // On desktop targets the simulator runs in a background thread at a
    // fixed timestep, matching the drawing node's polling cadence.
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex,
        },
        thread::{self, JoinHandle},
        time::Duration,
    };

    use common::robot::Pose2;
    use pubsub::Publisher;
    use slam::SensorPolar2D;
    use tracing::info;
    use web_time::Instant;

    use crate::sim::Simulator;

    pub struct SimulatorLoop {
        simulator: Arc<Mutex<Simulator>>,
        pub_scan: Publisher<(SensorPolar2D, Pose2)>,
        handle: Option<SimulatorThreadHandle>,
    }

    impl SimulatorLoop {
        pub fn new(simulator: Arc<Mutex<Simulator>>, pub_scan: Publisher<(SensorPolar2D, Pose2)>) -> Self {
            Self {
                simulator,
                pub_scan,
                handle: None,
            }
        }

        pub fn tick(&mut self, running: bool) {
            if running && self.handle.is_none() {
                self.handle = Some(SimulatorThreadHandle::new(self.simulator.clone(), self.pub_scan.clone()))
            }

            if !running {
                if let Some(h) = self.handle.take() {
                    h.stop();
                }
            }
        }
    }

    struct SimulatorThreadHandle {
        handle: JoinHandle<()>,
        running: Arc<AtomicBool>,
    }

    impl SimulatorThreadHandle {
        pub fn new(sim: Arc<Mutex<Simulator>>, mut pub_scan: Publisher<(SensorPolar2D, Pose2)>) -> Self {
            let running = Arc::new(AtomicBool::new(true));

            let handle = thread::spawn({
                let running = running.clone();
                move || Self::thread(running, sim, &mut pub_scan)
            });

            SimulatorThreadHandle { handle, running }
        }

        fn thread(running: Arc<AtomicBool>, sim: Arc<Mutex<Simulator>>, pub_scan: &mut Publisher<(SensorPolar2D, Pose2)>) {
            info!("Simulator thread started");

            let dt = 1.0 / 30.0;
            let mut current_time = Instant::now();
            let mut accumulator = 0.0;

            while running.load(Ordering::Relaxed) {
                let new_time = Instant::now();
                let frame_time = new_time - current_time;
                current_time = new_time;

                accumulator += frame_time.as_secs_f64();

                while accumulator >= dt {
                    if let Some(output) = sim.lock().expect("simulator lock poisoned").tick(dt as f32) {
                        pub_scan.publish(Arc::new(output));
                    }
                    accumulator -= dt;
                }

                thread::sleep(Duration::from_secs_f64(dt));
            }

            info!("Simulator thread ended");
        }

        pub fn stop(self) {
            self.running.store(false, Ordering::Relaxed);
            self.handle.join().expect("simulator thread panicked");
        }
    }
}
