/// Terminal front end for pose annotation
use anyhow::{bail, Context};
use crossterm::{
    cursor,
    event::{self, Event, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use nalgebra::Point2;
use posekit_core::{parse_solved_pose, pick_point, Camera, Mesh, Pose, Ray, Session, Transform};
use std::io::{self, stdout, Write};
use std::path::PathBuf;
use tracing::{info, warn};

pub mod input;
pub mod renderer;

pub use input::{route, Axis, Command};
pub use renderer::AsciiRenderer;

/// Rows reserved below the canvas for the status lines
const STATUS_ROWS: usize = 2;

/// Runtime settings taken from the command line
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output: PathBuf,
    pub translation_step: f64,
    pub rotation_step: f64,
    pub proxy_size: f64,
    pub snap: bool,
    /// Where the solver request is written
    pub solver_request: PathBuf,
    /// Where the solved 16-float matrix is read from
    pub solver_response: PathBuf,
}

/// Main application struct for terminal annotation
pub struct TerminalApp {
    session: Session,
    config: AppConfig,
    proxy: Mesh,
    renderer: AsciiRenderer,
    cursor: (usize, usize),
    snap: bool,
    running: bool,
    message: String,
}

impl TerminalApp {
    pub fn new(session: Session, config: AppConfig) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(session, config, width as usize, height as usize))
    }

    /// Build for a terminal of `width` x `height` cells
    pub fn with_size(
        session: Session,
        config: AppConfig,
        width: usize,
        height: usize,
    ) -> Self {
        let canvas_height = height.saturating_sub(STATUS_ROWS).max(1);
        Self {
            proxy: Mesh::cube(config.proxy_size),
            snap: config.snap,
            renderer: AsciiRenderer::new(width.max(1), canvas_height),
            cursor: (width / 2, canvas_height / 2),
            running: true,
            message: String::new(),
            session,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn snap(&self) -> bool {
        self.snap
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> anyhow::Result<()> {
        while self.running {
            self.render()?;
            self.handle_input()?;
        }
        Ok(())
    }

    fn handle_input(&mut self) -> anyhow::Result<()> {
        let Event::Key(key) = event::read()? else {
            return Ok(());
        };
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        if let Some(command) = route(key) {
            if let Err(err) = self.execute(command) {
                warn!("{command:?} failed: {err:#}");
                self.message = format!("{err:#}");
            }
        }
        Ok(())
    }

    /// Apply one command to the session
    pub fn execute(&mut self, command: Command) -> anyhow::Result<()> {
        self.message.clear();
        match command {
            Command::Quit => self.running = false,
            Command::Save => self.save()?,
            Command::Nudge { axis, sign } => {
                let delta = self.nudge_delta(axis, sign);
                self.session.nudge_relative(&delta)?;
            }
            Command::PrevImage => self.session.prev_image()?,
            Command::NextImage => self.session.next_image()?,
            Command::ShowImage(index) => self.session.select_image(index)?,
            Command::NewPart => self.session.add_positioned_part()?,
            Command::DuplicatePart => self.session.duplicate_positioned_part()?,
            Command::NextPart => self.session.next_positioned_part()?,
            Command::RemovePart => {
                let index = self
                    .session
                    .positioned_part_index()
                    .context("no part selected")?;
                self.session.remove_positioned_part(index)?;
            }
            Command::CycleAssignedPart => self.cycle_assigned_part()?,
            Command::NewCorrespondence => self.session.add_correspondence(),
            Command::PrevCorrespondence => self.step_correspondence(-1)?,
            Command::NextCorrespondence => self.step_correspondence(1)?,
            Command::RemoveCorrespondence => {
                let index = self
                    .session
                    .selected_correspondence_index()
                    .context("no correspondence selected")?;
                self.session.remove_correspondence(index)?;
            }
            Command::ToggleSnap => self.snap = !self.snap,
            Command::MoveCursor { dx, dy } => self.move_cursor(dx, dy),
            Command::StorePixel => {
                let pixel = self.cursor_pixel().context("no image selected")?;
                self.session.set_selected_pixel(pixel)?;
            }
            Command::PickPoint => self.pick()?,
            Command::RequestSolve => self.request_solve()?,
            Command::LoadSolvedPose => self.load_solved_pose()?,
        }
        Ok(())
    }

    fn cycle_assigned_part(&mut self) -> anyhow::Result<()> {
        let current = self
            .session
            .positioned_part()
            .context("no part selected")?
            .part
            .id;
        let parts = &self.session.dataset().parts;
        let position = parts.iter().position(|part| part.id == current).unwrap_or(0);
        let next = parts
            .iter()
            .cycle()
            .nth(position + 1)
            .map(|part| part.id)
            .context("dataset has no parts")?;
        self.session.assign_part(next)?;
        Ok(())
    }

    fn step_correspondence(&mut self, step: isize) -> anyhow::Result<()> {
        let len = self.session.correspondences().len();
        if len == 0 {
            bail!("no correspondences");
        }
        let current = self.session.selected_correspondence_index().unwrap_or(0);
        let next = (current as isize + step).rem_euclid(len as isize);
        self.session.select_correspondence(next as usize)?;
        Ok(())
    }

    fn request_solve(&mut self) -> anyhow::Result<()> {
        let request = self.session.pose_request()?;
        let path = &self.config.solver_request;
        std::fs::write(path, request.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(points = request.points.len(), path = %path.display(), "wrote solver request");
        self.message = format!("wrote {}", path.display());
        Ok(())
    }

    fn load_solved_pose(&mut self) -> anyhow::Result<()> {
        let path = &self.config.solver_response;
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let pose = parse_solved_pose(&json)?;
        self.session.apply_solved_pose(&pose)?;
        Ok(())
    }

    fn nudge_delta(&self, axis: Axis, sign: f64) -> Pose {
        let step = sign
            * if axis.is_rotation() {
                self.config.rotation_step
            } else {
                self.config.translation_step
            };
        let mut delta = Pose::identity();
        match axis {
            Axis::X => delta.x = step,
            Axis::Y => delta.y = step,
            Axis::Z => delta.z = step,
            Axis::W => delta.w = step,
            Axis::P => delta.p = step,
            Axis::R => delta.r = step,
        }
        delta
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) {
        let clamp = |value: usize, delta: i32, len: usize| {
            (value as i64 + delta as i64).clamp(0, len as i64 - 1) as usize
        };
        self.cursor = (
            clamp(self.cursor.0, dx, self.renderer.width()),
            clamp(self.cursor.1, dy, self.renderer.height()),
        );
    }

    /// Image pixel under the centre of the cursor cell
    pub fn cursor_pixel(&self) -> Option<Point2<f64>> {
        let image = self.session.image()?;
        let column = (self.cursor.0 as f64 + 0.5) / self.renderer.width() as f64;
        let row = (self.cursor.1 as f64 + 0.5) / self.renderer.height() as f64;
        Some(Point2::new(
            column * image.width() as f64,
            row * image.height() as f64,
        ))
    }

    fn cell_of(&self, pixel: &Point2<f64>) -> Option<(usize, usize)> {
        let image = self.session.image()?;
        let x = pixel.x / image.width() as f64 * self.renderer.width() as f64;
        let y = pixel.y / image.height() as f64 * self.renderer.height() as f64;
        (x >= 0.0 && y >= 0.0).then_some((x as usize, y as usize))
    }

    /// Pick the surface point under the cursor and store it part-local
    fn pick(&mut self) -> anyhow::Result<()> {
        let image = self.session.image().context("no image selected")?;
        let pixel = self.cursor_pixel().context("no image selected")?;
        let ray: Ray = Camera::from_image(image).ray_through_pixel(pixel.x, pixel.y);
        let world = self
            .session
            .absolute_pose()
            .context("no part selected")?
            .to_matrix();

        let Some(point) = pick_point(&self.proxy, &world, &ray, self.snap) else {
            self.message = "no surface under cursor".into();
            return Ok(());
        };
        let local = Transform::rigid_inverse(&world).transform_point(&point);
        self.session.set_selected_point(local)?;
        Ok(())
    }

    fn save(&mut self) -> anyhow::Result<()> {
        let json = self.session.dataset().to_json()?;
        std::fs::write(&self.config.output, json)
            .with_context(|| format!("writing {}", self.config.output.display()))?;
        info!(path = %self.config.output.display(), "saved dataset");
        self.message = format!("saved {}", self.config.output.display());
        Ok(())
    }

    /// Rasterize every placed part and the markers into the canvas
    pub fn draw_scene(&mut self) {
        self.renderer.clear();

        if let (Some(scene), Some(image)) = (self.session.scene(), self.session.image()) {
            let camera = Camera::from_image(image);
            let selected = self.session.positioned_part_index();
            for (index, positioned) in scene.positioned_parts.iter().enumerate() {
                let model = positioned.pose.to_matrix();
                self.renderer
                    .render_mesh(&self.proxy, &model, &camera, selected == Some(index));
            }
        }

        let stored: Vec<_> = self
            .session
            .correspondences()
            .iter()
            .filter_map(|c| self.cell_of(&c.pixel))
            .collect();
        for (x, y) in stored {
            self.renderer.mark(x, y, 'o');
        }
        self.renderer.mark(self.cursor.0, self.cursor.1, '+');
    }

    pub fn status_lines(&self) -> [String; 2] {
        let fmt_pose = |pose: &Pose| {
            format!(
                "{:.2} {:.2} {:.2} | {:.2} {:.2} {:.2}",
                pose.x, pose.y, pose.z, pose.w, pose.p, pose.r
            )
        };
        let images = self.session.scene().map_or(0, |scene| scene.images.len());
        let parts = self.session.scene().map_or(0, |scene| scene.positioned_parts.len());
        let position =
            |index: Option<usize>| index.map_or("-".to_string(), |i| (i + 1).to_string());

        let first = format!(
            "img {}/{} | part {}/{} | snap {} | corr {} | {}",
            position(self.session.image_index()),
            images,
            position(self.session.positioned_part_index()),
            parts,
            if self.snap { "on" } else { "off" },
            self.session.correspondences().len(),
            self.message,
        );
        let second = format!(
            "abs {} || rel {}",
            self.session.absolute_pose().map_or("-".to_string(), fmt_pose),
            fmt_pose(self.session.relative_pose()),
        );
        [first, second]
    }

    fn render(&mut self) -> io::Result<()> {
        self.draw_scene();

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        for line in self.status_lines() {
            queue!(
                stdout,
                terminal::Clear(terminal::ClearType::CurrentLine),
                SetForegroundColor(Color::Yellow),
                Print(line),
                ResetColor,
                Print("\r\n")
            )?;
        }

        stdout.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use posekit_core::{Dataset, Image, Intrinsics, Part, PositionedPart, Scene};

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("posekit-{name}-{}.json", std::process::id()))
    }

    fn app(output: PathBuf) -> TerminalApp {
        let part = Part::new(1, "obj_000001.ply", None);
        let other = Part::new(2, "obj_000002.ply", None);
        // Vision camera at the origin looking down +z, part 100 units in front
        let image = Image::new(
            "0",
            "rgb/000000.png",
            640,
            480,
            Intrinsics::new(600.0, 600.0, 320.0, 240.0),
            Pose::identity(),
        )
        .unwrap();
        let scene = Scene {
            id: "1".into(),
            images: vec![image.clone(), image],
            positioned_parts: vec![PositionedPart::new(
                part.clone(),
                Pose::new(0.0, 0.0, 100.0, 0.0, 0.0, 0.0),
            )],
        };
        let session = Session::new(Dataset {
            scenes: vec![scene],
            parts: vec![part, other],
        })
        .unwrap();
        let config = AppConfig {
            output,
            translation_step: 0.5,
            rotation_step: 2.0,
            proxy_size: 20.0,
            snap: false,
            solver_request: temp_file("request"),
            solver_response: temp_file("response"),
        };
        TerminalApp::with_size(session, config, 64, 50)
    }

    #[test]
    fn test_nudge_moves_relative_pose() {
        let mut app = app(PathBuf::from("unused.json"));
        let before = *app.session().relative_pose();
        app.execute(Command::Nudge { axis: Axis::X, sign: -1.0 }).unwrap();
        assert_abs_diff_eq!(app.session().relative_pose().x, before.x - 0.5, epsilon = 1e-9);

        app.execute(Command::Nudge { axis: Axis::R, sign: 1.0 }).unwrap();
        assert_abs_diff_eq!(app.session().relative_pose().r, before.r + 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pick_stores_part_local_point() {
        let mut app = app(PathBuf::from("unused.json"));
        app.execute(Command::NewCorrespondence).unwrap();
        app.execute(Command::StorePixel).unwrap();
        app.execute(Command::MoveCursor { dx: 3, dy: 0 }).unwrap();
        app.execute(Command::PickPoint).unwrap();

        let correspondence = app.session().selected_correspondence().unwrap();
        assert_abs_diff_eq!(correspondence.pixel.x, 325.0, epsilon = 1e-9);
        assert_abs_diff_eq!(correspondence.pixel.y, 245.0, epsilon = 1e-9);
        // Cursor ray hits the face nearest to the camera, 10 units before the centre
        assert_abs_diff_eq!(correspondence.point.x, 5.25, epsilon = 1e-9);
        assert_abs_diff_eq!(correspondence.point.z, -10.0, epsilon = 1e-9);

        app.execute(Command::ToggleSnap).unwrap();
        assert!(app.snap());
        app.execute(Command::PickPoint).unwrap();
        let point = app.session().selected_correspondence().unwrap().point;
        assert_abs_diff_eq!(point.z, -10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_errors_leave_app_running() {
        let mut app = app(PathBuf::from("unused.json"));
        assert!(app.execute(Command::StorePixel).is_err());
        assert!(app.execute(Command::ShowImage(5)).is_err());
        assert!(app.is_running());
        app.execute(Command::Quit).unwrap();
        assert!(!app.is_running());
    }

    #[test]
    fn test_save_round_trips_dataset() {
        let path = temp_file("save");
        let mut app = app(path.clone());
        app.execute(Command::Save).unwrap();

        let saved = Dataset::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(saved.scenes[0].positioned_parts[0].pose.z, 100.0);
    }

    #[test]
    fn test_status_line_reports_selection() {
        let mut app = app(PathBuf::from("unused.json"));
        app.execute(Command::NextImage).unwrap();
        app.execute(Command::NewCorrespondence).unwrap();
        let [first, second] = app.status_lines();
        assert!(first.starts_with("img 2/2 | part 1/1 | snap off | corr 1"));
        assert!(second.starts_with("abs 0.00 0.00 100.00"));
    }

    #[test]
    fn test_remove_part_deletes_selected_placement() {
        let mut app = app(PathBuf::from("unused.json"));
        app.execute(Command::DuplicatePart).unwrap();
        assert_eq!(app.session().scene().unwrap().positioned_parts.len(), 2);

        app.execute(Command::RemovePart).unwrap();
        assert_eq!(app.session().scene().unwrap().positioned_parts.len(), 1);
        assert_eq!(app.session().positioned_part_index(), Some(0));

        app.execute(Command::RemovePart).unwrap();
        assert!(app.session().positioned_part().is_none());
        assert!(app.execute(Command::RemovePart).is_err());
    }

    #[test]
    fn test_cycle_assigned_part_wraps() {
        let mut app = app(PathBuf::from("unused.json"));
        app.execute(Command::NewCorrespondence).unwrap();
        app.execute(Command::CycleAssignedPart).unwrap();
        assert_eq!(app.session().positioned_part().unwrap().part.id, 2);
        assert!(app.session().correspondences().is_empty());

        app.execute(Command::CycleAssignedPart).unwrap();
        assert_eq!(app.session().positioned_part().unwrap().part.id, 1);
    }

    #[test]
    fn test_correspondence_cycling_and_removal() {
        let mut app = app(PathBuf::from("unused.json"));
        assert!(app.execute(Command::NextCorrespondence).is_err());

        for _ in 0..3 {
            app.execute(Command::NewCorrespondence).unwrap();
        }
        assert_eq!(app.session().selected_correspondence_index(), Some(2));
        app.execute(Command::NextCorrespondence).unwrap();
        assert_eq!(app.session().selected_correspondence_index(), Some(0));
        app.execute(Command::PrevCorrespondence).unwrap();
        assert_eq!(app.session().selected_correspondence_index(), Some(2));
        app.execute(Command::PrevCorrespondence).unwrap();
        assert_eq!(app.session().selected_correspondence_index(), Some(1));

        app.execute(Command::RemoveCorrespondence).unwrap();
        assert_eq!(app.session().correspondences().len(), 2);
        assert_eq!(app.session().selected_correspondence_index(), Some(1));
    }

    #[test]
    fn test_solver_request_and_response_files() {
        let mut app = app(PathBuf::from("unused.json"));
        app.execute(Command::NewCorrespondence).unwrap();
        app.execute(Command::StorePixel).unwrap();
        app.execute(Command::RequestSolve).unwrap();

        let request = std::fs::read_to_string(temp_file("request")).unwrap();
        std::fs::remove_file(temp_file("request")).unwrap();
        let request: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert_eq!(request["pixels"][0][0], 325.0);
        assert_eq!(request["cameraMatrix"][0], 600.0);

        // Part 50 units in front of the render camera, which sits at the origin
        let solved = Pose::new(0.0, 0.0, -50.0, 0.0, 0.0, 0.0).to_column_array();
        std::fs::write(temp_file("response"), serde_json::to_string(&solved.to_vec()).unwrap())
            .unwrap();
        app.execute(Command::LoadSolvedPose).unwrap();
        std::fs::remove_file(temp_file("response")).unwrap();

        assert_abs_diff_eq!(app.session().relative_pose().z, -50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(app.session().absolute_pose().unwrap().z, 50.0, epsilon = 1e-9);
    }
}
